use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for agents table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub region: Option<String>,
    pub is_active: bool,
    pub available_balance: Decimal,
    pub strikes: i32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Database row for payment_accounts table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAccount {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub method: String,
    pub account_name: String,
    pub account_number: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_primary: bool,
}

/// One eligible (agent, payment account) pair, flattened from the join of
/// active agents and active accounts for a payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AgentCandidate {
    pub agent_id: Uuid,
    pub agent_user_id: Uuid,
    pub agent_name: String,
    pub region: Option<String>,
    pub available_balance: Decimal,
    pub strikes: i32,
    pub account_id: Uuid,
    pub method: String,
    pub account_name: String,
    pub account_number: String,
    pub is_primary: bool,
    pub is_verified: bool,
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for trades table. Append-only ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub market_id: Uuid,
    pub outcome_id: Option<Uuid>,
    pub user_id: Uuid,
    pub outcome: String,
    pub side: String,
    pub shares: Decimal,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub fee: Decimal,
    pub created_at: DateTime<Utc>,
}

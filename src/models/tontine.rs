use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for tontine_groups table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TontineGroup {
    pub id: Uuid,
    pub name: String,
    pub contribution_amount: Decimal,
    pub cycle_interval_days: i32,
    pub status: String,
    pub current_cycle: i32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Database row for tontine_members table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TontineMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub rotation_position: i32,
    pub auto_pay: bool,
    pub has_received_payout: bool,
}

/// Database row for tontine_cycles table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TontineCycle {
    pub id: Uuid,
    pub group_id: Uuid,
    pub cycle_number: i32,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub recipient_member_id: Option<Uuid>,
    pub payout_amount: Option<Decimal>,
}

/// Database row for tontine_contributions table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TontineContribution {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub member_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
}

pub mod contribution_status {
    pub const PENDING: &str = "pending";
    pub const PAID: &str = "paid";
    pub const MISSED: &str = "missed";
}

pub mod cycle_status {
    pub const COLLECTING: &str = "collecting";
    pub const PAID_OUT: &str = "paid_out";
}

pub mod group_status {
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
}

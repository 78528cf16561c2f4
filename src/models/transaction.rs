use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for transactions table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub amount: Decimal,
    pub status: String,
    pub description: Option<String>,
    pub metadata: Json<TransactionMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn stage(&self) -> Option<WorkflowStage> {
        self.metadata.workflow_stage
    }

    pub fn is_terminal(&self) -> bool {
        self.status != transaction_status::PENDING
    }
}

/// Transaction status constants. Coarse tri-state; the workflow stage in
/// `metadata` refines `pending`.
pub mod transaction_status {
    pub const PENDING: &str = "pending";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TradeBuy,
    TradeSell,
    TontineContribution,
    TontinePayout,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TradeBuy => "trade_buy",
            TransactionKind::TradeSell => "trade_sell",
            TransactionKind::TontineContribution => "tontine_contribution",
            TransactionKind::TontinePayout => "tontine_payout",
        }
    }
}

/// Fine-grained funding workflow stage.
///
/// The first four stages only ever exist inside a client-held
/// [`DepositDraft`](crate::deposits::workflow::DepositDraft); rows in the
/// database start at `AwaitingAgentConfirmation` (deposits) or
/// `AwaitingAgentPayout` (withdrawals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    AmountEntered,
    PaymentMethodSelected,
    AgentMatched,
    AwaitingProofUpload,
    AwaitingAgentConfirmation,
    AwaitingAgentPayout,
    Completed,
    Rejected,
    TimedOut,
    Refunded,
}

impl WorkflowStage {
    /// Coarse status a row at this stage must carry.
    pub fn status(&self) -> &'static str {
        match self {
            WorkflowStage::Completed => transaction_status::COMPLETED,
            WorkflowStage::Rejected | WorkflowStage::TimedOut | WorkflowStage::Refunded => {
                transaction_status::FAILED
            }
            _ => transaction_status::PENDING,
        }
    }

    pub fn can_transition_to(&self, next: WorkflowStage) -> bool {
        use WorkflowStage::*;
        matches!(
            (self, next),
            (AmountEntered, PaymentMethodSelected)
                | (PaymentMethodSelected, AgentMatched)
                | (AgentMatched, AwaitingProofUpload)
                | (AwaitingProofUpload, AwaitingAgentConfirmation)
                | (AwaitingAgentConfirmation, Completed)
                | (AwaitingAgentConfirmation, Rejected)
                | (AwaitingAgentConfirmation, TimedOut)
                // withdrawal reassignment restarts the payout window
                | (AwaitingAgentPayout, AwaitingAgentPayout)
                | (AwaitingAgentPayout, Completed)
                | (AwaitingAgentPayout, Refunded)
        )
    }
}

/// JSONB payload of a transaction row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<WorkflowStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_account_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_agents: Vec<Uuid>,
    #[serde(default)]
    pub reassignments: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tontine_cycle_id: Option<Uuid>,
}

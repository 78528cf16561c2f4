pub mod agent_matcher;
pub mod expiry;
pub mod funding;
pub mod workflow;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::WorkflowStage;

/// Failures of the deposit and withdrawal workflow.
#[derive(Debug, Error)]
pub enum DepositError {
    #[error("no agent available for payment method '{0}'")]
    NoAgentAvailable(String),

    #[error("transaction {0} has expired")]
    TransactionExpired(Uuid),

    #[error("transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("cannot move transaction from {from:?} to {to:?}")]
    InvalidTransition {
        from: Option<WorkflowStage>,
        to: WorkflowStage,
    },

    #[error("caller is not the agent assigned to transaction {0}")]
    NotAssignedAgent(Uuid),

    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("user profile not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

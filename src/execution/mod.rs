pub mod planner;
pub mod position_book;
pub mod trade_executor;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::amm::PricingError;
use crate::models::{Outcome, Side};

/// A single trade as requested by a user.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub user_id: Uuid,
    pub market_id: Uuid,
    /// Required for `multiple` markets, ignored otherwise.
    pub outcome_id: Option<Uuid>,
    pub outcome: Outcome,
    pub side: Side,
    pub amount: Decimal,
}

/// Every way a trade can be refused. All variants except `Database` and
/// `Internal` are raised before anything is written.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("market not found: {0}")]
    MarketNotFound(Uuid),

    #[error("market {0} is not open for trading")]
    MarketInactive(Uuid),

    #[error("pool shape mismatch: {0}")]
    MarketShapeMismatch(String),

    #[error("invalid outcome: {0}")]
    InvalidOutcome(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient liquidity for {requested}; maximum you can buy right now is {suggested_max}")]
    InsufficientLiquidity {
        requested: Decimal,
        suggested_max: Decimal,
    },

    #[error("trade too large: {requested} shares requested, {available} available")]
    TradeTooLarge {
        requested: Decimal,
        available: Decimal,
    },

    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient shares: selling {requested}, holding {held}")]
    InsufficientShares { requested: Decimal, held: Decimal },

    #[error("user profile not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TradeError {
    /// Whether the error is a business rejection (as opposed to a fault).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            TradeError::Database(_) | TradeError::Internal(_) | TradeError::MarketShapeMismatch(_)
        )
    }
}

impl From<PricingError> for TradeError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::MarketShapeMismatch(msg) => TradeError::MarketShapeMismatch(msg.into()),
            PricingError::InvalidOutcome { .. } => TradeError::InvalidOutcome(e.to_string()),
            PricingError::InvalidAmount(msg) => TradeError::InvalidAmount(msg),
            PricingError::TradeTooLarge {
                requested,
                available,
            } => TradeError::TradeTooLarge {
                requested,
                available,
            },
            PricingError::DepletedPool => TradeError::MarketShapeMismatch(e.to_string()),
        }
    }
}

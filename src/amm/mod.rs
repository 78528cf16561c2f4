//! Constant-product market maker pricing.
//!
//! Everything in this module is pure: a pool state goes in, a [`Quote`]
//! carrying the resulting pool state comes out. Persisting that state is the
//! trade executor's job.

pub mod binary;
pub mod precision;
pub mod three_way;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Outcome, Side};

/// Draw reserves below this are treated as absent (binary pool).
pub const DRAW_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6); // 0.000001

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("pool shape does not match the pricing handler ({0})")]
    MarketShapeMismatch(&'static str),

    #[error("outcome '{outcome}' is not tradeable on a {shape} pool")]
    InvalidOutcome { outcome: String, shape: &'static str },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("trade too large: {requested} shares requested, {available} available")]
    TradeTooLarge {
        requested: Decimal,
        available: Decimal,
    },

    #[error("pool reserves must be strictly positive")]
    DepletedPool,
}

/// Reserve state of a pool. The variant is the market shape; it is fixed when
/// the pool is created and never changes across trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PoolShape {
    Binary { yes: Decimal, no: Decimal },
    ThreeWay { yes: Decimal, no: Decimal, draw: Decimal },
}

impl PoolShape {
    /// Build a pool shape from stored reserve columns.
    pub fn from_reserves(yes: Decimal, no: Decimal, draw: Decimal) -> Result<Self, PricingError> {
        if yes <= Decimal::ZERO || no <= Decimal::ZERO || draw < Decimal::ZERO {
            return Err(PricingError::DepletedPool);
        }
        if draw < DRAW_EPSILON {
            Ok(PoolShape::Binary { yes, no })
        } else {
            Ok(PoolShape::ThreeWay { yes, no, draw })
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolShape::Binary { .. } => "binary",
            PoolShape::ThreeWay { .. } => "three-way",
        }
    }

    pub fn yes_reserve(&self) -> Decimal {
        match *self {
            PoolShape::Binary { yes, .. } | PoolShape::ThreeWay { yes, .. } => yes,
        }
    }

    pub fn no_reserve(&self) -> Decimal {
        match *self {
            PoolShape::Binary { no, .. } | PoolShape::ThreeWay { no, .. } => no,
        }
    }

    /// Zero for binary pools.
    pub fn draw_reserve(&self) -> Decimal {
        match *self {
            PoolShape::Binary { .. } => Decimal::ZERO,
            PoolShape::ThreeWay { draw, .. } => draw,
        }
    }

    pub fn reserve(&self, outcome: Outcome) -> Result<Decimal, PricingError> {
        match (self, outcome) {
            (_, Outcome::Yes) => Ok(self.yes_reserve()),
            (_, Outcome::No) => Ok(self.no_reserve()),
            (PoolShape::ThreeWay { draw, .. }, Outcome::Draw) => Ok(*draw),
            (PoolShape::Binary { .. }, Outcome::Draw) => Err(self.invalid_outcome(outcome)),
        }
    }

    /// Product of all reserves. For three-way pools this is informational only.
    pub fn constant_product(&self) -> Decimal {
        match *self {
            PoolShape::Binary { yes, no } => yes * no,
            PoolShape::ThreeWay { yes, no, draw } => yes * no * draw,
        }
    }

    /// Untruncated spot price of an outcome.
    pub fn spot_price(&self, outcome: Outcome) -> Result<Decimal, PricingError> {
        match *self {
            PoolShape::Binary { .. } => binary::spot_price(self, outcome),
            PoolShape::ThreeWay { .. } => three_way::spot_price(self, outcome),
        }
    }

    /// Derived market prices, truncated to price precision and summing to 1.
    pub fn prices(&self) -> MarketPrices {
        match *self {
            PoolShape::Binary { yes, no } => {
                let yes_price = precision::price(no / (yes + no));
                MarketPrices {
                    yes: yes_price,
                    no: Decimal::ONE - yes_price,
                    draw: None,
                }
            }
            PoolShape::ThreeWay { yes, no, draw } => {
                let total = yes + no + draw;
                let two_total = total + total;
                let yes_price = precision::price((no + draw) / two_total);
                let no_price = precision::price((yes + draw) / two_total);
                MarketPrices {
                    yes: yes_price,
                    no: no_price,
                    draw: Some(Decimal::ONE - yes_price - no_price),
                }
            }
        }
    }

    fn invalid_outcome(&self, outcome: Outcome) -> PricingError {
        PricingError::InvalidOutcome {
            outcome: outcome.to_string(),
            shape: self.name(),
        }
    }
}

/// Derived per-outcome prices persisted on the market (or outcome) row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketPrices {
    pub yes: Decimal,
    pub no: Decimal,
    pub draw: Option<Decimal>,
}

/// Result of pricing one trade against a pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub outcome: Outcome,
    pub side: Side,
    /// Shares bought or sold.
    pub shares: Decimal,
    /// Cash moved: paid in on a buy, paid out on a sell.
    pub amount: Decimal,
    pub effective_price: Decimal,
    pub spot_price: Decimal,
    pub slippage_pct: Decimal,
    pub new_pool: PoolShape,
}

/// Price a trade. Dispatches on the pool shape.
pub fn calculate_trade(
    pool: &PoolShape,
    outcome: Outcome,
    amount: Decimal,
    side: Side,
) -> Result<Quote, PricingError> {
    let amount = validate_amount(amount)?;
    match pool {
        PoolShape::Binary { .. } => binary::calculate(pool, outcome, amount, side),
        PoolShape::ThreeWay { .. } => three_way::calculate(pool, outcome, amount, side),
    }
}

/// Truncate a requested cash amount to currency precision and reject
/// anything that does not stay positive.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, PricingError> {
    let truncated = precision::currency(amount);
    if truncated <= Decimal::ZERO {
        return Err(PricingError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(truncated)
}

/// Convert a float amount coming off the wire. NaN and infinities are
/// rejected here since `Decimal` cannot represent them.
pub fn amount_from_f64(amount: f64) -> Result<Decimal, PricingError> {
    if !amount.is_finite() {
        return Err(PricingError::InvalidAmount(format!(
            "amount must be finite, got {amount}"
        )));
    }
    let value = Decimal::from_f64(amount)
        .ok_or_else(|| PricingError::InvalidAmount(format!("amount out of range: {amount}")))?;
    validate_amount(value)
}

/// |effective - spot| / spot, as a percentage. `None` on overflow.
pub(crate) fn slippage_pct(effective: Decimal, spot: Decimal) -> Option<Decimal> {
    if spot.is_zero() {
        return Some(Decimal::ZERO);
    }
    let ratio = effective.checked_sub(spot)?.checked_div(spot)?.abs();
    ratio.checked_mul(Decimal::ONE_HUNDRED).map(precision::currency)
}

/// Pool arithmetic that overflows `Decimal` means the amount cannot be
/// priced against this pool.
pub(crate) fn out_of_range(amount: Decimal) -> PricingError {
    PricingError::InvalidAmount(format!("amount {amount} is out of range for this pool"))
}

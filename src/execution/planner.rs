use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::amm::{self, precision, MarketPrices, PoolShape, Quote};
use crate::models::{MarketType, Outcome, Side};

use super::TradeError;

/// Fraction of an outcome's reserve a single buy must leave behind.
pub const LIQUIDITY_SAFETY_MARGIN: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05

/// Market state a quote is computed against. For `multiple` markets `pool`
/// is the chosen outcome's own yes/no pool.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub market_id: Uuid,
    pub market_type: MarketType,
    pub active: bool,
    pub pool: PoolShape,
    pub min_bet_amount: Decimal,
    pub max_bet_amount: Decimal,
}

/// What the user brings to the trade.
#[derive(Debug, Clone, Copy)]
pub struct Holdings {
    pub balance: Decimal,
    /// Net shares of the traded outcome, from the trade ledger.
    pub shares: Decimal,
}

/// Everything the executor needs to write once a trade is accepted.
#[derive(Debug, Clone, Serialize)]
pub struct TradePlan {
    pub quote: Quote,
    pub new_balance: Decimal,
    pub prices: MarketPrices,
}

/// Steps up to and including the liquidity guard. Used on its own for
/// read-only quotes.
pub fn quote(
    snapshot: &MarketSnapshot,
    outcome: Outcome,
    side: Side,
    amount: Decimal,
) -> Result<Quote, TradeError> {
    if !snapshot.active {
        return Err(TradeError::MarketInactive(snapshot.market_id));
    }
    check_outcome(snapshot, outcome)?;

    let quote = amm::calculate_trade(&snapshot.pool, outcome, amount, side)?;

    if side == Side::Buy {
        liquidity_guard(&snapshot.pool, &quote)?;
    }
    Ok(quote)
}

/// Full validation of a trade. Nothing here touches storage; a returned plan
/// is safe to apply as-is.
pub fn plan_trade(
    snapshot: &MarketSnapshot,
    holdings: Holdings,
    outcome: Outcome,
    side: Side,
    amount: Decimal,
) -> Result<TradePlan, TradeError> {
    let quote = quote(snapshot, outcome, side, amount)?;

    let new_balance = match side {
        Side::Buy => {
            if holdings.balance < quote.amount {
                return Err(TradeError::InsufficientBalance {
                    required: quote.amount,
                    available: holdings.balance,
                });
            }
            holdings.balance - quote.amount
        }
        Side::Sell => {
            if holdings.shares < quote.shares {
                return Err(TradeError::InsufficientShares {
                    requested: quote.shares,
                    held: holdings.shares,
                });
            }
            holdings.balance + quote.amount
        }
    };

    let requested = precision::currency(amount);
    if requested < snapshot.min_bet_amount || requested > snapshot.max_bet_amount {
        return Err(TradeError::InvalidAmount(format!(
            "amount {requested} outside allowed range {} - {}",
            snapshot.min_bet_amount, snapshot.max_bet_amount
        )));
    }

    let prices = quote.new_pool.prices();
    Ok(TradePlan {
        quote,
        new_balance,
        prices,
    })
}

fn check_outcome(snapshot: &MarketSnapshot, outcome: Outcome) -> Result<(), TradeError> {
    match (snapshot.market_type, &snapshot.pool) {
        (MarketType::Binary | MarketType::Multiple, PoolShape::Binary { .. }) => {
            if outcome == Outcome::Draw {
                return Err(TradeError::InvalidOutcome(
                    "draw is only tradeable on sports markets".into(),
                ));
            }
            Ok(())
        }
        (MarketType::Sports, PoolShape::ThreeWay { .. }) => Ok(()),
        (MarketType::Sports, PoolShape::Binary { .. }) => Err(TradeError::InvalidOutcome(
            "sports market has no draw reserve".into(),
        )),
        (_, PoolShape::ThreeWay { .. }) => Err(TradeError::MarketShapeMismatch(format!(
            "{:?} market backed by a three-way pool",
            snapshot.market_type
        ))),
    }
}

/// Reject buys that would take more than 95% of the bought outcome's
/// reserve, suggesting the largest amount that would pass.
fn liquidity_guard(pool: &PoolShape, quote: &Quote) -> Result<(), TradeError> {
    let reserve = pool.reserve(quote.outcome)?;
    let usable = reserve * (Decimal::ONE - LIQUIDITY_SAFETY_MARGIN);
    if quote.shares <= usable {
        return Ok(());
    }

    let suggested_max = match *pool {
        // shares(a) = r - k/(opp + a) <= (1-m)r  <=>  a <= opp * (1-m)/m
        PoolShape::Binary { .. } => {
            let opposite = match quote.outcome {
                Outcome::Yes => pool.no_reserve(),
                _ => pool.yes_reserve(),
            };
            opposite * (Decimal::ONE - LIQUIDITY_SAFETY_MARGIN) / LIQUIDITY_SAFETY_MARGIN
        }
        PoolShape::ThreeWay { .. } => usable * pool.spot_price(quote.outcome)?,
    };

    Err(TradeError::InsufficientLiquidity {
        requested: quote.amount,
        suggested_max: precision::currency(suggested_max),
    })
}

use rust_decimal::Decimal;

use crate::models::{Outcome, Side};

use super::{out_of_range, precision, slippage_pct, PoolShape, PricingError, Quote};

/// Spot price of one side of a binary pool: opposite reserve over total.
pub fn spot_price(pool: &PoolShape, outcome: Outcome) -> Result<Decimal, PricingError> {
    let (own, other) = sides(pool, outcome)?;
    Ok(other / (own + other))
}

/// Price a trade on a `yes * no = k` pool.
///
/// Buying sends cash into the opposite reserve and takes shares out of the
/// bought one; selling is the same invariant solved the other way round.
pub fn calculate(
    pool: &PoolShape,
    outcome: Outcome,
    amount: Decimal,
    side: Side,
) -> Result<Quote, PricingError> {
    let (own, other) = sides(pool, outcome)?;
    let k = own * other;
    let spot = other / (own + other);

    let (shares, cash, new_own, new_other) = match side {
        Side::Buy => {
            let new_other = other.checked_add(amount).ok_or_else(|| out_of_range(amount))?;
            let shares = precision::shares(own - k / new_other);
            if shares <= Decimal::ZERO {
                return Err(PricingError::InvalidAmount(format!(
                    "amount {amount} buys no shares"
                )));
            }
            (shares, amount, own - shares, new_other)
        }
        Side::Sell => {
            let shares = amount
                .checked_div(spot)
                .map(precision::shares)
                .ok_or_else(|| out_of_range(amount))?;
            if shares <= Decimal::ZERO {
                return Err(PricingError::InvalidAmount(format!(
                    "amount {amount} sells no shares"
                )));
            }
            let new_own = own.checked_add(shares).ok_or_else(|| out_of_range(amount))?;
            let payout = precision::currency(other - k / new_own);
            if payout <= Decimal::ZERO {
                return Err(PricingError::InvalidAmount(format!(
                    "selling {shares} shares pays out nothing"
                )));
            }
            (shares, payout, new_own, other - payout)
        }
    };

    let effective_price = cash
        .checked_div(shares)
        .map(precision::price)
        .ok_or_else(|| out_of_range(amount))?;
    let slippage = slippage_pct(effective_price, spot).ok_or_else(|| out_of_range(amount))?;
    let new_pool = match outcome {
        Outcome::Yes => PoolShape::Binary { yes: new_own, no: new_other },
        _ => PoolShape::Binary { yes: new_other, no: new_own },
    };

    Ok(Quote {
        outcome,
        side,
        shares,
        amount: cash,
        effective_price,
        spot_price: precision::price(spot),
        slippage_pct: slippage,
        new_pool,
    })
}

/// (reserve of the traded outcome, reserve of the opposite outcome)
fn sides(pool: &PoolShape, outcome: Outcome) -> Result<(Decimal, Decimal), PricingError> {
    let PoolShape::Binary { yes, no } = *pool else {
        return Err(PricingError::MarketShapeMismatch(
            "binary pricing called on a three-way pool",
        ));
    };
    match outcome {
        Outcome::Yes => Ok((yes, no)),
        Outcome::No => Ok((no, yes)),
        Outcome::Draw => Err(PricingError::InvalidOutcome {
            outcome: outcome.to_string(),
            shape: pool.name(),
        }),
    }
}

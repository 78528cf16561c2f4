use rust_decimal::Decimal;

use crate::models::{Outcome, Side};

use super::{out_of_range, precision, PoolShape, PricingError, Quote};

/// Slippage reported for every three-way trade. There is no continuous
/// slippage model for these pools.
pub const NOMINAL_SLIPPAGE_PCT: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5

/// Reserves under this size allow a capped purchase instead of a rejection.
const SMALL_RESERVE: Decimal = Decimal::ONE;
/// Share of a small reserve a capped purchase may take.
const SMALL_RESERVE_CAP: Decimal = Decimal::from_parts(8, 0, 0, false, 1); // 0.8
/// Sells never drain a reserve below this.
const RESERVE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// Spot price of an outcome: the other two reserves over twice the total.
/// The three spot prices sum to 1.
pub fn spot_price(pool: &PoolShape, outcome: Outcome) -> Result<Decimal, PricingError> {
    let (own, a, b) = split(pool, outcome)?;
    let total = own + a + b;
    Ok((a + b) / (total + total))
}

/// Price a trade on a three-outcome pool.
///
/// Shares are priced at spot. Cash entering or leaving the pool is split
/// evenly between the two outcomes that were not traded.
pub fn calculate(
    pool: &PoolShape,
    outcome: Outcome,
    amount: Decimal,
    side: Side,
) -> Result<Quote, PricingError> {
    let (own, a, b) = split(pool, outcome)?;
    let spot = spot_price(pool, outcome)?;
    let requested = amount.checked_div(spot).ok_or_else(|| out_of_range(amount))?;

    let (shares, cash, new_own, new_a, new_b) = match side {
        Side::Buy => {
            // Taking exactly the whole reserve would leave it at zero.
            let (shares, cash) = if requested >= own {
                if own >= SMALL_RESERVE {
                    return Err(PricingError::TradeTooLarge {
                        requested: precision::shares(requested),
                        available: own,
                    });
                }
                let capped = precision::shares(own * SMALL_RESERVE_CAP);
                (capped, precision::currency(capped * spot))
            } else {
                (precision::shares(requested), amount)
            };
            if shares <= Decimal::ZERO || cash <= Decimal::ZERO {
                return Err(PricingError::InvalidAmount(format!(
                    "amount {amount} buys no shares"
                )));
            }
            let half = cash / Decimal::TWO;
            (shares, cash, own - shares, a + half, b + half)
        }
        Side::Sell => {
            let shares = precision::shares(requested);
            if shares <= Decimal::ZERO {
                return Err(PricingError::InvalidAmount(format!(
                    "amount {amount} sells no shares"
                )));
            }
            let half = amount / Decimal::TWO;
            (
                shares,
                amount,
                own.checked_add(shares).ok_or_else(|| out_of_range(amount))?,
                (a - half).max(RESERVE_FLOOR),
                (b - half).max(RESERVE_FLOOR),
            )
        }
    };

    let new_pool = join(outcome, new_own, new_a, new_b);

    Ok(Quote {
        outcome,
        side,
        shares,
        amount: cash,
        effective_price: precision::price(cash / shares),
        spot_price: precision::price(spot),
        slippage_pct: NOMINAL_SLIPPAGE_PCT,
        new_pool,
    })
}

/// (traded reserve, first other reserve, second other reserve), with the
/// others in yes → no → draw order.
fn split(pool: &PoolShape, outcome: Outcome) -> Result<(Decimal, Decimal, Decimal), PricingError> {
    let PoolShape::ThreeWay { yes, no, draw } = *pool else {
        return Err(PricingError::MarketShapeMismatch(
            "three-way pricing called on a binary pool",
        ));
    };
    Ok(match outcome {
        Outcome::Yes => (yes, no, draw),
        Outcome::No => (no, yes, draw),
        Outcome::Draw => (draw, yes, no),
    })
}

fn join(outcome: Outcome, own: Decimal, a: Decimal, b: Decimal) -> PoolShape {
    match outcome {
        Outcome::Yes => PoolShape::ThreeWay { yes: own, no: a, draw: b },
        Outcome::No => PoolShape::ThreeWay { yes: a, no: own, draw: b },
        Outcome::Draw => PoolShape::ThreeWay { yes: a, no: b, draw: own },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn even_pool() -> PoolShape {
        PoolShape::ThreeWay { yes: d(50), no: d(50), draw: d(50) }
    }

    #[test]
    fn test_even_pool_spot_is_one_third() {
        for outcome in [Outcome::Yes, Outcome::No, Outcome::Draw] {
            let spot = spot_price(&even_pool(), outcome).unwrap();
            assert_eq!(precision::price(spot), Decimal::new(3333, 4));
        }
    }

    #[test]
    fn test_buy_draw_beyond_reserve_is_rejected() {
        // 30 / (1/3) = 90 shares against a 50 share reserve
        let err = calculate(&even_pool(), Outcome::Draw, d(30), Side::Buy).unwrap_err();
        match err {
            PricingError::TradeTooLarge { requested, available } => {
                assert_eq!(requested, d(90));
                assert_eq!(available, d(50));
            }
            other => panic!("expected TradeTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_small_reserve_purchase_is_capped() {
        let pool = PoolShape::ThreeWay {
            yes: Decimal::new(5, 1), // 0.5
            no: d(100),
            draw: d(100),
        };
        let quote = calculate(&pool, Outcome::Yes, d(10), Side::Buy).unwrap();
        assert_eq!(quote.shares, Decimal::new(4, 1)); // 80% of 0.5
        assert!(quote.amount < d(10));
        assert!(quote.new_pool.yes_reserve() > Decimal::ZERO);
    }

    #[test]
    fn test_buy_moves_cash_into_other_reserves() {
        let pool = even_pool();
        let quote = calculate(&pool, Outcome::Yes, d(6), Side::Buy).unwrap();

        assert_eq!(quote.shares, d(18));
        assert_eq!(quote.new_pool.yes_reserve(), d(32));
        let others_before = pool.no_reserve() + pool.draw_reserve();
        let others_after = quote.new_pool.no_reserve() + quote.new_pool.draw_reserve();
        assert_eq!(others_after - others_before, quote.amount);
        assert_eq!(quote.slippage_pct, NOMINAL_SLIPPAGE_PCT);
    }

    #[test]
    fn test_sell_draws_cash_from_other_reserves() {
        let pool = even_pool();
        let quote = calculate(&pool, Outcome::No, d(4), Side::Sell).unwrap();

        assert_eq!(quote.shares, d(12));
        assert_eq!(quote.new_pool.no_reserve(), d(62));
        assert_eq!(quote.new_pool.yes_reserve(), d(48));
        assert_eq!(quote.new_pool.draw_reserve(), d(48));
        assert_eq!(quote.amount, d(4));
    }

    #[test]
    fn test_sell_floors_other_reserves() {
        let pool = PoolShape::ThreeWay {
            yes: d(1),
            no: d(100),
            draw: d(1),
        };
        let quote = calculate(&pool, Outcome::No, d(10), Side::Sell).unwrap();
        assert_eq!(quote.new_pool.yes_reserve(), RESERVE_FLOOR);
        assert_eq!(quote.new_pool.draw_reserve(), RESERVE_FLOOR);
    }

    #[test]
    fn test_buying_the_whole_reserve_is_rejected() {
        // spot(yes) = 30 / 80 = 0.375, so 3.75 asks for exactly the 10 share reserve
        let pool = PoolShape::ThreeWay { yes: d(10), no: d(20), draw: d(10) };
        let err = calculate(&pool, Outcome::Yes, Decimal::new(375, 2), Side::Buy).unwrap_err();
        assert_eq!(
            err,
            PricingError::TradeTooLarge { requested: d(10), available: d(10) }
        );
    }

    #[test]
    fn test_oversized_sell_is_out_of_range() {
        let err = calculate(&even_pool(), Outcome::Draw, Decimal::MAX, Side::Sell).unwrap_err();
        assert!(matches!(err, PricingError::InvalidAmount(_)));
    }

    #[test]
    fn test_binary_pool_is_a_shape_mismatch() {
        let pool = PoolShape::Binary { yes: d(10), no: d(10) };
        let err = calculate(&pool, Outcome::Draw, d(1), Side::Buy).unwrap_err();
        assert!(matches!(err, PricingError::MarketShapeMismatch(_)));
    }

    #[test]
    fn test_prices_stay_normalised_across_trades() {
        let mut pool = even_pool();
        for (outcome, amount, side) in [
            (Outcome::Yes, 5, Side::Buy),
            (Outcome::Draw, 3, Side::Buy),
            (Outcome::No, 2, Side::Sell),
        ] {
            pool = calculate(&pool, outcome, d(amount), side).unwrap().new_pool;
            let prices = pool.prices();
            assert_eq!(prices.yes + prices.no + prices.draw.unwrap(), Decimal::ONE);
        }
    }
}

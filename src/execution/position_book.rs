use rust_decimal::Decimal;

use crate::amm::precision;
use crate::models::Side;

/// Positions holding less than this many shares are closed out.
pub const DUST_SHARES: Decimal = Decimal::from_parts(1, 0, 0, false, 6); // 0.000001

/// The mutable part of a position row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub shares: Decimal,
    pub average_price: Decimal,
    pub total_invested: Decimal,
}

/// Apply a fill to an existing holding (or none). Returns `None` when the
/// position should be deleted.
pub fn apply_fill(
    existing: Option<Holding>,
    side: Side,
    shares: Decimal,
    price: Decimal,
    amount: Decimal,
) -> Option<Holding> {
    match (side, existing) {
        (Side::Buy, None) => Some(Holding {
            shares,
            average_price: price,
            total_invested: amount,
        }),
        (Side::Buy, Some(pos)) => {
            let new_shares = pos.shares + shares;
            let weighted = pos.average_price * pos.shares + price * shares;
            Some(Holding {
                shares: new_shares,
                average_price: precision::price(weighted / new_shares),
                total_invested: pos.total_invested + amount,
            })
        }
        (Side::Sell, None) => None,
        (Side::Sell, Some(pos)) => {
            let remaining = pos.shares - shares;
            if remaining < DUST_SHARES {
                return None;
            }
            // cost basis shrinks in proportion to the shares that left
            let invested = precision::currency(pos.total_invested * remaining / pos.shares);
            Some(Holding {
                shares: remaining,
                average_price: pos.average_price,
                total_invested: invested,
            })
        }
    }
}

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for share quantities.
pub const SHARE_DP: u32 = 6;
/// Decimal places kept for per-share prices.
pub const PRICE_DP: u32 = 4;
/// Decimal places kept for currency amounts.
pub const CURRENCY_DP: u32 = 2;

/// Truncate toward zero. Settlement never rounds up, so a trade can never
/// hand out more than the pool computed.
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

pub fn shares(value: Decimal) -> Decimal {
    truncate(value, SHARE_DP)
}

pub fn price(value: Decimal) -> Decimal {
    truncate(value, PRICE_DP)
}

pub fn currency(value: Decimal) -> Decimal {
    truncate(value, CURRENCY_DP)
}

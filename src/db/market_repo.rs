use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::amm::MarketPrices;
use crate::models::{Market, MarketOutcome};

/// Fetch a market by id.
pub async fn get_market(db: impl PgExecutor<'_>, market_id: Uuid) -> anyhow::Result<Option<Market>> {
    let market = sqlx::query_as::<_, Market>("SELECT * FROM markets WHERE id = $1")
        .bind(market_id)
        .fetch_optional(db)
        .await?;

    Ok(market)
}

/// Fetch and row-lock a market for the rest of the transaction.
pub async fn get_market_for_update(
    conn: &mut PgConnection,
    market_id: Uuid,
) -> anyhow::Result<Option<Market>> {
    let market = sqlx::query_as::<_, Market>("SELECT * FROM markets WHERE id = $1 FOR UPDATE")
        .bind(market_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(market)
}

/// Fetch one outcome of a `multiple` market.
pub async fn get_outcome(
    db: impl PgExecutor<'_>,
    market_id: Uuid,
    outcome_id: Uuid,
) -> anyhow::Result<Option<MarketOutcome>> {
    let outcome = sqlx::query_as::<_, MarketOutcome>(
        "SELECT * FROM market_outcomes WHERE id = $1 AND market_id = $2",
    )
    .bind(outcome_id)
    .bind(market_id)
    .fetch_optional(db)
    .await?;

    Ok(outcome)
}

/// Fetch and row-lock one outcome of a `multiple` market.
pub async fn get_outcome_for_update(
    conn: &mut PgConnection,
    market_id: Uuid,
    outcome_id: Uuid,
) -> anyhow::Result<Option<MarketOutcome>> {
    let outcome = sqlx::query_as::<_, MarketOutcome>(
        "SELECT * FROM market_outcomes WHERE id = $1 AND market_id = $2 FOR UPDATE",
    )
    .bind(outcome_id)
    .bind(market_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(outcome)
}

/// Share counter deltas produced by one trade.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareDeltas {
    pub yes: Decimal,
    pub no: Decimal,
    pub draw: Decimal,
}

/// Persist derived prices and bump cumulative counters on the market row.
pub async fn record_market_trade(
    conn: &mut PgConnection,
    market_id: Uuid,
    prices: &MarketPrices,
    volume: Decimal,
    deltas: ShareDeltas,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE markets
        SET yes_price = $2, no_price = $3, draw_price = $4,
            total_volume = total_volume + $5,
            total_yes_shares = total_yes_shares + $6,
            total_no_shares = total_no_shares + $7,
            total_draw_shares = total_draw_shares + $8,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(market_id)
    .bind(prices.yes)
    .bind(prices.no)
    .bind(prices.draw)
    .bind(volume)
    .bind(deltas.yes)
    .bind(deltas.no)
    .bind(deltas.draw)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist a traded outcome's new reserves, prices and counters. For
/// `multiple` markets all trade state lives on the outcome row.
#[allow(clippy::too_many_arguments)]
pub async fn record_outcome_trade(
    conn: &mut PgConnection,
    outcome_id: Uuid,
    yes_reserve: Decimal,
    no_reserve: Decimal,
    liquidity_delta: Decimal,
    prices: &MarketPrices,
    volume: Decimal,
    deltas: ShareDeltas,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE market_outcomes
        SET yes_reserve = $2, no_reserve = $3, constant_product = $2 * $3,
            total_liquidity = total_liquidity + $4,
            yes_price = $5, no_price = $6,
            total_volume = total_volume + $7,
            total_yes_shares = total_yes_shares + $8,
            total_no_shares = total_no_shares + $9,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(outcome_id)
    .bind(yes_reserve)
    .bind(no_reserve)
    .bind(liquidity_delta)
    .bind(prices.yes)
    .bind(prices.no)
    .bind(volume)
    .bind(deltas.yes)
    .bind(deltas.no)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

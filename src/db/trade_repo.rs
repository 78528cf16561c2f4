use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Outcome, Side, Trade};

/// Append a trade to the ledger. Ledger rows are never updated.
#[allow(clippy::too_many_arguments)]
pub async fn insert_trade(
    conn: &mut PgConnection,
    market_id: Uuid,
    outcome_id: Option<Uuid>,
    user_id: Uuid,
    outcome: Outcome,
    side: Side,
    shares: Decimal,
    price_per_share: Decimal,
    total_amount: Decimal,
    fee: Decimal,
) -> anyhow::Result<Trade> {
    let trade = sqlx::query_as::<_, Trade>(
        r#"
        INSERT INTO trades (market_id, outcome_id, user_id, outcome, side, shares, price_per_share, total_amount, fee)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(market_id)
    .bind(outcome_id)
    .bind(user_id)
    .bind(outcome.as_str())
    .bind(side.as_str())
    .bind(shares)
    .bind(price_per_share)
    .bind(total_amount)
    .bind(fee)
    .fetch_one(&mut *conn)
    .await?;

    Ok(trade)
}

/// Net shares a user holds of one outcome: bought minus sold, from the ledger.
pub async fn net_shares(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    market_id: Uuid,
    outcome_id: Option<Uuid>,
    outcome: Outcome,
) -> anyhow::Result<Decimal> {
    let row: (Option<Decimal>,) = sqlx::query_as(
        r#"
        SELECT SUM(CASE WHEN side = 'buy' THEN shares ELSE -shares END)
        FROM trades
        WHERE user_id = $1 AND market_id = $2
          AND outcome_id IS NOT DISTINCT FROM $3
          AND outcome = $4
        "#,
    )
    .bind(user_id)
    .bind(market_id)
    .bind(outcome_id)
    .bind(outcome.as_str())
    .fetch_one(db)
    .await?;

    Ok(row.0.unwrap_or(Decimal::ZERO))
}

/// A user's trades in a market, oldest first.
pub async fn get_user_trades(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    market_id: Uuid,
) -> anyhow::Result<Vec<Trade>> {
    let trades = sqlx::query_as::<_, Trade>(
        "SELECT * FROM trades WHERE user_id = $1 AND market_id = $2 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .bind(market_id)
    .fetch_all(db)
    .await?;

    Ok(trades)
}

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::amm::PoolShape;
use crate::models::LiquidityPool;

/// Fetch a market's liquidity pool.
pub async fn get_pool(db: impl PgExecutor<'_>, market_id: Uuid) -> anyhow::Result<Option<LiquidityPool>> {
    let pool = sqlx::query_as::<_, LiquidityPool>(
        "SELECT * FROM liquidity_pools WHERE market_id = $1",
    )
    .bind(market_id)
    .fetch_optional(db)
    .await?;

    Ok(pool)
}

/// Fetch and row-lock a market's liquidity pool. Concurrent trades on the
/// same market queue here until the holder commits.
pub async fn get_pool_for_update(
    conn: &mut PgConnection,
    market_id: Uuid,
) -> anyhow::Result<Option<LiquidityPool>> {
    let pool = sqlx::query_as::<_, LiquidityPool>(
        "SELECT * FROM liquidity_pools WHERE market_id = $1 FOR UPDATE",
    )
    .bind(market_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(pool)
}

/// Create the pool for a new market. The draw reserve is zero for binary
/// markets and fixes the pool's shape for good.
pub async fn create_pool(
    db: impl PgExecutor<'_>,
    market_id: Uuid,
    shape: &PoolShape,
    initial_liquidity: Decimal,
) -> anyhow::Result<LiquidityPool> {
    let pool = sqlx::query_as::<_, LiquidityPool>(
        r#"
        INSERT INTO liquidity_pools (market_id, yes_reserve, no_reserve, draw_reserve, constant_product, total_liquidity)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(market_id)
    .bind(shape.yes_reserve())
    .bind(shape.no_reserve())
    .bind(shape.draw_reserve())
    .bind(shape.constant_product())
    .bind(initial_liquidity)
    .fetch_one(db)
    .await?;

    Ok(pool)
}

/// Write post-trade reserves and recompute the constant product.
pub async fn update_reserves(
    conn: &mut PgConnection,
    pool_id: Uuid,
    shape: &PoolShape,
    liquidity_delta: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE liquidity_pools
        SET yes_reserve = $2, no_reserve = $3, draw_reserve = $4,
            constant_product = $5,
            total_liquidity = total_liquidity + $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(pool_id)
    .bind(shape.yes_reserve())
    .bind(shape.no_reserve())
    .bind(shape.draw_reserve())
    .bind(shape.constant_product())
    .bind(liquidity_delta)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

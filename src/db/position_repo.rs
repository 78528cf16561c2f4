use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::execution::position_book::Holding;
use crate::models::{Outcome, Position};

/// Row-lock the position for one (user, market, outcome) holding.
pub async fn get_position_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    market_id: Uuid,
    outcome_id: Option<Uuid>,
    outcome: Outcome,
) -> anyhow::Result<Option<Position>> {
    let position = sqlx::query_as::<_, Position>(
        r#"
        SELECT * FROM positions
        WHERE user_id = $1 AND market_id = $2
          AND outcome_id IS NOT DISTINCT FROM $3
          AND outcome = $4
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(market_id)
    .bind(outcome_id)
    .bind(outcome.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(position)
}

/// Open a new position.
pub async fn insert_position(
    conn: &mut PgConnection,
    user_id: Uuid,
    market_id: Uuid,
    outcome_id: Option<Uuid>,
    outcome: Outcome,
    holding: &Holding,
) -> anyhow::Result<Position> {
    let position = sqlx::query_as::<_, Position>(
        r#"
        INSERT INTO positions (user_id, market_id, outcome_id, outcome, shares, average_price, total_invested)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(market_id)
    .bind(outcome_id)
    .bind(outcome.as_str())
    .bind(holding.shares)
    .bind(holding.average_price)
    .bind(holding.total_invested)
    .fetch_one(&mut *conn)
    .await?;

    Ok(position)
}

pub async fn update_position(
    conn: &mut PgConnection,
    position_id: Uuid,
    holding: &Holding,
) -> anyhow::Result<Position> {
    let position = sqlx::query_as::<_, Position>(
        r#"
        UPDATE positions
        SET shares = $2, average_price = $3, total_invested = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(position_id)
    .bind(holding.shares)
    .bind(holding.average_price)
    .bind(holding.total_invested)
    .fetch_one(&mut *conn)
    .await?;

    Ok(position)
}

pub async fn delete_position(conn: &mut PgConnection, position_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM positions WHERE id = $1")
        .bind(position_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// All open positions for a user.
pub async fn get_user_positions(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<Vec<Position>> {
    let positions = sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(positions)
}

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Agent, AgentCandidate};

/// Every (active agent, active account) pair offering a payment method.
pub async fn get_candidates(db: impl PgExecutor<'_>, method: &str) -> anyhow::Result<Vec<AgentCandidate>> {
    let rows = sqlx::query_as::<_, AgentCandidate>(
        r#"
        SELECT a.id AS agent_id, a.user_id AS agent_user_id, a.name AS agent_name,
               a.region, a.available_balance, a.strikes,
               pa.id AS account_id, pa.method, pa.account_name, pa.account_number,
               pa.is_primary, pa.is_verified
        FROM payment_accounts pa
        JOIN agents a ON a.id = pa.agent_id
        WHERE pa.method = $1 AND pa.is_active = true AND a.is_active = true
        "#,
    )
    .bind(method)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// The agent record owned by a platform user, if they are an agent.
pub async fn get_agent_by_user(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(agent)
}

/// Penalise an agent for letting a request time out.
pub async fn add_strike(conn: &mut PgConnection, agent_id: Uuid) -> anyhow::Result<i32> {
    let row: (i32,) = sqlx::query_as(
        "UPDATE agents SET strikes = strikes + 1 WHERE id = $1 RETURNING strikes",
    )
    .bind(agent_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

/// Move an agent's float by `delta` (negative to debit).
pub async fn adjust_available_balance(
    conn: &mut PgConnection,
    agent_id: Uuid,
    delta: Decimal,
) -> anyhow::Result<Decimal> {
    let row: (Decimal,) = sqlx::query_as(
        "UPDATE agents SET available_balance = available_balance + $2 WHERE id = $1 RETURNING available_balance",
    )
    .bind(agent_id)
    .bind(delta)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

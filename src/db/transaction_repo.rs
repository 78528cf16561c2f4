use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Transaction, TransactionKind, TransactionMetadata};

/// Record a transaction.
pub async fn insert_transaction(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    kind: TransactionKind,
    amount: Decimal,
    status: &str,
    description: &str,
    metadata: &TransactionMetadata,
) -> anyhow::Result<Transaction> {
    let tx = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (user_id, kind, amount, status, description, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(status)
    .bind(description)
    .bind(Json(metadata))
    .fetch_one(db)
    .await?;

    Ok(tx)
}

pub async fn get_transaction(db: impl PgExecutor<'_>, id: Uuid) -> anyhow::Result<Option<Transaction>> {
    let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;

    Ok(tx)
}

/// Row-lock a transaction for a workflow transition.
pub async fn get_transaction_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> anyhow::Result<Option<Transaction>> {
    let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(tx)
}

/// Move a still-pending transaction to a new status and metadata. Returns
/// `false` when the row was no longer pending, so a transition is only ever
/// applied once.
pub async fn transition_pending(
    conn: &mut PgConnection,
    id: Uuid,
    status: &str,
    metadata: &TransactionMetadata,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, metadata = $3, updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(Json(metadata))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Ids of pending transactions of one kind created at or before `cutoff`.
pub async fn pending_created_before(
    db: impl PgExecutor<'_>,
    kind: TransactionKind,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM transactions
        WHERE kind = $1 AND status = 'pending' AND created_at <= $2
        ORDER BY created_at ASC
        LIMIT $3
        "#,
    )
    .bind(kind.as_str())
    .bind(cutoff)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Ids of pending withdrawals whose current agent was assigned at or before
/// `cutoff`.
pub async fn stale_withdrawals(
    db: impl PgExecutor<'_>,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM transactions
        WHERE kind = 'withdrawal' AND status = 'pending'
          AND COALESCE((metadata->>'assigned_at')::timestamptz, created_at) <= $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Lock a transaction only if it is still pending and no other worker holds
/// it. `None` means someone else got there first.
pub async fn lock_pending(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Transaction>> {
    let tx = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 AND status = 'pending' FOR UPDATE SKIP LOCKED",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(tx)
}

/// Pending funding requests assigned to an agent.
pub async fn get_pending_for_agent(
    db: impl PgExecutor<'_>,
    agent_id: Uuid,
) -> anyhow::Result<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE status = 'pending' AND metadata->>'agent_id' = $1::text
        ORDER BY created_at ASC
        "#,
    )
    .bind(agent_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

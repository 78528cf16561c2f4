use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{TontineContribution, TontineCycle, TontineGroup, TontineMember};

/// A contribution that has come due, joined with what auto-pay needs.
#[derive(Debug, Clone, FromRow)]
pub struct DueContribution {
    pub contribution_id: Uuid,
    pub cycle_id: Uuid,
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub user_id: Uuid,
    pub auto_pay: bool,
    pub amount: Decimal,
    pub status: String,
}

/// Ids of contributions that have come due in collecting cycles: every
/// pending one, plus missed ones of auto-pay members that may since have been
/// funded.
pub async fn due_contributions(
    db: impl PgExecutor<'_>,
    now: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT c.id
        FROM tontine_contributions c
        JOIN tontine_cycles cy ON cy.id = c.cycle_id
        JOIN tontine_members m ON m.id = c.member_id
        JOIN tontine_groups g ON g.id = cy.group_id
        WHERE g.status = 'active'
          AND cy.status = 'collecting'
          AND cy.due_date <= $1
          AND (c.status = 'pending' OR (c.status = 'missed' AND m.auto_pay))
        ORDER BY cy.due_date ASC, m.rotation_position ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Lock one due contribution if it still needs settling and is not held by
/// another worker.
pub async fn lock_due_contribution(
    conn: &mut PgConnection,
    contribution_id: Uuid,
) -> anyhow::Result<Option<DueContribution>> {
    let row = sqlx::query_as::<_, DueContribution>(
        r#"
        SELECT c.id AS contribution_id, c.cycle_id, cy.group_id, c.member_id,
               m.user_id, m.auto_pay, c.amount, c.status
        FROM tontine_contributions c
        JOIN tontine_cycles cy ON cy.id = c.cycle_id
        JOIN tontine_members m ON m.id = c.member_id
        WHERE c.id = $1
          AND cy.status = 'collecting'
          AND (c.status = 'pending' OR (c.status = 'missed' AND m.auto_pay))
        FOR UPDATE OF c SKIP LOCKED
        "#,
    )
    .bind(contribution_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn set_contribution_status(
    conn: &mut PgConnection,
    contribution_id: Uuid,
    status: &str,
    paid_at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE tontine_contributions SET status = $2, paid_at = $3 WHERE id = $1")
        .bind(contribution_id)
        .bind(status)
        .bind(paid_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Ids of cycles still collecting in active groups.
pub async fn collecting_cycles(db: impl PgExecutor<'_>, limit: i64) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT cy.id FROM tontine_cycles cy
        JOIN tontine_groups g ON g.id = cy.group_id
        WHERE cy.status = 'collecting' AND g.status = 'active'
        ORDER BY cy.due_date ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Lock a cycle for payout if it is still collecting.
pub async fn lock_collecting_cycle(
    conn: &mut PgConnection,
    cycle_id: Uuid,
) -> anyhow::Result<Option<TontineCycle>> {
    let cycle = sqlx::query_as::<_, TontineCycle>(
        "SELECT * FROM tontine_cycles WHERE id = $1 AND status = 'collecting' FOR UPDATE SKIP LOCKED",
    )
    .bind(cycle_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(cycle)
}

pub async fn get_cycle_contributions(
    conn: &mut PgConnection,
    cycle_id: Uuid,
) -> anyhow::Result<Vec<TontineContribution>> {
    let rows = sqlx::query_as::<_, TontineContribution>(
        "SELECT * FROM tontine_contributions WHERE cycle_id = $1",
    )
    .bind(cycle_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub async fn get_group_for_update(conn: &mut PgConnection, group_id: Uuid) -> anyhow::Result<Option<TontineGroup>> {
    let group = sqlx::query_as::<_, TontineGroup>("SELECT * FROM tontine_groups WHERE id = $1 FOR UPDATE")
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(group)
}

pub async fn get_members(conn: &mut PgConnection, group_id: Uuid) -> anyhow::Result<Vec<TontineMember>> {
    let rows = sqlx::query_as::<_, TontineMember>(
        "SELECT * FROM tontine_members WHERE group_id = $1 ORDER BY rotation_position ASC",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub async fn mark_member_paid_out(conn: &mut PgConnection, member_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE tontine_members SET has_received_payout = true WHERE id = $1")
        .bind(member_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn close_cycle(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    recipient_member_id: Uuid,
    payout_amount: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE tontine_cycles
        SET status = 'paid_out', recipient_member_id = $2, payout_amount = $3
        WHERE id = $1
        "#,
    )
    .bind(cycle_id)
    .bind(recipient_member_id)
    .bind(payout_amount)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Open a cycle and seed a pending contribution for every member.
pub async fn open_cycle(
    conn: &mut PgConnection,
    group: &TontineGroup,
    cycle_number: i32,
    due_date: DateTime<Utc>,
) -> anyhow::Result<TontineCycle> {
    let cycle = sqlx::query_as::<_, TontineCycle>(
        r#"
        INSERT INTO tontine_cycles (group_id, cycle_number, due_date)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(group.id)
    .bind(cycle_number)
    .bind(due_date)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO tontine_contributions (cycle_id, member_id, amount)
        SELECT $1, id, $2 FROM tontine_members WHERE group_id = $3
        "#,
    )
    .bind(cycle.id)
    .bind(group.contribution_amount)
    .bind(group.id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE tontine_groups SET current_cycle = $2 WHERE id = $1")
        .bind(group.id)
        .bind(cycle_number)
        .execute(&mut *conn)
        .await?;

    Ok(cycle)
}

pub async fn complete_group(conn: &mut PgConnection, group_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE tontine_groups SET status = 'completed' WHERE id = $1")
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

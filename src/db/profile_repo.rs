use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::Profile;

pub async fn get_profile(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(profile)
}

/// Row-lock a profile and return it.
pub async fn get_profile_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> anyhow::Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(profile)
}

pub async fn set_balance(
    conn: &mut PgConnection,
    user_id: Uuid,
    balance: Decimal,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE profiles SET balance = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(balance)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Add to a balance, returning the new balance.
pub async fn credit(conn: &mut PgConnection, user_id: Uuid, amount: Decimal) -> anyhow::Result<Decimal> {
    let row: (Decimal,) = sqlx::query_as(
        "UPDATE profiles SET balance = balance + $2, updated_at = NOW() WHERE id = $1 RETURNING balance",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

/// Subtract from a balance only if it covers the amount. Returns the new
/// balance, or `None` when funds are insufficient (nothing is written).
pub async fn debit_if_sufficient(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
) -> anyhow::Result<Option<Decimal>> {
    let row: Option<(Decimal,)> = sqlx::query_as(
        r#"
        UPDATE profiles SET balance = balance - $2, updated_at = NOW()
        WHERE id = $1 AND balance >= $2
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| r.0))
}

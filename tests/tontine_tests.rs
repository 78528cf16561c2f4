mod common;

use chrono::{Duration, DurationRound, Utc};
use uuid::Uuid;

use common::dec;
use marketcore::db::tontine_repo;
use marketcore::deposits::expiry::WorkflowTimeouts;
use marketcore::models::{TontineCycle, TontineGroup, TontineMember};
use marketcore::services::timeout_sweeper::TimeoutSweeper;

async fn seed_member(pool: &sqlx::PgPool, group_id: Uuid, user_id: Uuid, position: i32, auto_pay: bool) -> TontineMember {
    sqlx::query_as::<_, TontineMember>(
        r#"
        INSERT INTO tontine_members (group_id, user_id, rotation_position, auto_pay)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .bind(position)
    .bind(auto_pay)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn cycles_of(pool: &sqlx::PgPool, group_id: Uuid) -> Vec<TontineCycle> {
    sqlx::query_as::<_, TontineCycle>(
        "SELECT * FROM tontine_cycles WHERE group_id = $1 ORDER BY cycle_number",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

// One test per file: each sweep touches every due cycle in the database.
#[tokio::test]
async fn test_sweeper_runs_a_tontine_rotation_to_completion() {
    let Some(pool) = common::setup_test_db().await else { return };
    let sweeper = TimeoutSweeper::new(pool.clone(), WorkflowTimeouts::default(), 10_000);
    // Postgres keeps microseconds; whole seconds compare cleanly.
    let now = Utc::now().duration_trunc(Duration::seconds(1)).unwrap();

    let group = sqlx::query_as::<_, TontineGroup>(
        r#"
        INSERT INTO tontine_groups (name, contribution_amount, cycle_interval_days)
        VALUES ('Family circle', 50, 30)
        RETURNING *
        "#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let alice = common::seed_profile(&pool, dec("200"), None).await;
    let bob = common::seed_profile(&pool, dec("30"), None).await;
    let first = seed_member(&pool, group.id, alice.id, 1, true).await;
    let second = seed_member(&pool, group.id, bob.id, 2, true).await;

    let due = now - Duration::days(1);
    let mut conn = pool.acquire().await.unwrap();
    let cycle = tontine_repo::open_cycle(&mut *conn, &group, 1, due).await.unwrap();
    drop(conn);

    // Bob cannot cover the contribution yet, so the cycle stays open.
    let report = sweeper.sweep_at(now).await.unwrap();
    assert!(report.contributions_paid >= 1);
    assert!(report.contributions_missed >= 1);
    assert_eq!(common::balance_of(&pool, alice.id).await, dec("150"));
    assert_eq!(common::balance_of(&pool, bob.id).await, dec("30"));
    assert_eq!(cycles_of(&pool, group.id).await[0].status, "collecting");

    // Once funded, the missed contribution is retried and the pot paid out.
    sqlx::query("UPDATE profiles SET balance = 100 WHERE id = $1")
        .bind(bob.id)
        .execute(&pool)
        .await
        .unwrap();
    sweeper.sweep_at(now).await.unwrap();

    let cycles = cycles_of(&pool, group.id).await;
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].id, cycle.id);
    assert_eq!(cycles[0].status, "paid_out");
    assert_eq!(cycles[0].recipient_member_id, Some(first.id));
    assert_eq!(cycles[0].payout_amount, Some(dec("100")));
    assert_eq!(cycles[1].status, "collecting");
    assert_eq!(cycles[1].due_date, due + Duration::days(30));
    assert_eq!(common::balance_of(&pool, alice.id).await, dec("250"));
    assert_eq!(common::balance_of(&pool, bob.id).await, dec("50"));

    // Nothing is due before the next date.
    sweeper.sweep_at(now).await.unwrap();
    assert_eq!(common::balance_of(&pool, alice.id).await, dec("250"));

    // The second cycle pays the last member and closes the group.
    sweeper.sweep_at(now + Duration::days(30)).await.unwrap();

    let cycles = cycles_of(&pool, group.id).await;
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].status, "paid_out");
    assert_eq!(cycles[1].recipient_member_id, Some(second.id));
    assert_eq!(common::balance_of(&pool, alice.id).await, dec("200"));
    assert_eq!(common::balance_of(&pool, bob.id).await, dec("100"));

    let status: (String,) = sqlx::query_as("SELECT status FROM tontine_groups WHERE id = $1")
        .bind(group.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status.0, "completed");
}

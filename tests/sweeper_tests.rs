mod common;

use chrono::{Duration, Utc};

use common::dec;
use marketcore::db::transaction_repo;
use marketcore::deposits::expiry::WorkflowTimeouts;
use marketcore::deposits::funding;
use marketcore::deposits::workflow::DepositDraft;
use marketcore::models::{Agent, WorkflowStage};
use marketcore::services::timeout_sweeper::TimeoutSweeper;

async fn agent_row(pool: &sqlx::PgPool, id: uuid::Uuid) -> Agent {
    sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// Every sweep in this file runs against the whole database, so the stale
// deposit and withdrawal flows share one test to keep them sequential.
#[tokio::test]
async fn test_sweeper_expires_deposits_and_rotates_withdrawals_once() {
    let Some(pool) = common::setup_test_db().await else { return };
    let sweeper = TimeoutSweeper::new(pool.clone(), WorkflowTimeouts::default(), 10_000);
    let now = Utc::now();

    let method = common::unique_method();
    let (first, _) = common::seed_agent(&pool, &method, "dakar", dec("5000"), true, true).await;
    let (second, _) = common::seed_agent(&pool, &method, "dakar", dec("5000"), false, false).await;

    // A deposit waiting on its agent.
    let depositor = common::seed_profile(&pool, dec("0"), Some("dakar")).await;
    let agent = funding::match_agent(&pool, depositor.id, &method).await.unwrap();
    assert_eq!(agent.agent_id, first.id);
    let submission = DepositDraft::new(dec("100"))
        .unwrap()
        .select_method(method.clone())
        .match_agent(agent)
        .unwrap()
        .await_proof()
        .submit("https://proofs.example/receipt.png")
        .unwrap();
    let deposit = funding::submit_deposit(&pool, depositor.id, submission).await.unwrap();

    // A withdrawal handed to the best agent.
    let withdrawer = common::seed_profile(&pool, dec("300"), None).await;
    let withdrawal =
        funding::create_withdrawal(&pool, withdrawer.id, dec("120"), &method, "770001122", now)
            .await
            .unwrap();
    assert_eq!(withdrawal.metadata.agent_id, Some(first.id));
    assert_eq!(common::balance_of(&pool, withdrawer.id).await, dec("180"));

    // One minute later the first agent has missed the window.
    let report = sweeper.sweep_at(now + Duration::seconds(61)).await.unwrap();
    assert!(report.withdrawals_reassigned >= 1);

    let row = transaction_repo::get_transaction(&pool, withdrawal.id).await.unwrap().unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.metadata.agent_id, Some(second.id));
    assert_eq!(row.metadata.reassignments, 1);
    assert_eq!(row.metadata.excluded_agents, vec![first.id]);
    assert_eq!(agent_row(&pool, first.id).await.strikes, 1);

    // The deposit is still inside its half hour.
    let row = transaction_repo::get_transaction(&pool, deposit.id).await.unwrap().unwrap();
    assert_eq!(row.status, "pending");

    // The second agent misses too and nobody is left: refund.
    sweeper.sweep_at(now + Duration::seconds(122)).await.unwrap();
    let row = transaction_repo::get_transaction(&pool, withdrawal.id).await.unwrap().unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.stage(), Some(WorkflowStage::Refunded));
    assert_eq!(agent_row(&pool, second.id).await.strikes, 1);
    assert_eq!(common::balance_of(&pool, withdrawer.id).await, dec("300"));

    // Thirty-one minutes in, the deposit expires.
    let report = sweeper.sweep_at(now + Duration::minutes(31)).await.unwrap();
    assert!(report.deposits_expired >= 1);

    let expired = transaction_repo::get_transaction(&pool, deposit.id).await.unwrap().unwrap();
    assert_eq!(expired.status, "failed");
    assert_eq!(expired.stage(), Some(WorkflowStage::TimedOut));
    assert_eq!(expired.metadata.failure_reason.as_deref(), Some("expired"));
    assert_eq!(common::balance_of(&pool, depositor.id).await, dec("0"));

    // Sweeping again changes nothing.
    sweeper.sweep_at(now + Duration::minutes(32)).await.unwrap();
    let again = transaction_repo::get_transaction(&pool, deposit.id).await.unwrap().unwrap();
    assert_eq!(again.updated_at, expired.updated_at);
    assert_eq!(again.metadata.0, expired.metadata.0);
    assert_eq!(common::balance_of(&pool, withdrawer.id).await, dec("300"));

    let last = sweeper.last_sweep().await.expect("sweep recorded");
    assert!(!sweeper.is_running());
    assert!(last.finished_at >= now);
}

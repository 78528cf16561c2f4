use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::amm::precision;
use crate::db::{agent_repo, profile_repo, transaction_repo};
use crate::models::transaction::transaction_status;
use crate::models::{
    Agent, AgentCandidate, Transaction, TransactionKind, TransactionMetadata, WorkflowStage,
};

use super::agent_matcher;
use super::expiry::{self, WorkflowTimeouts};
use super::workflow::DepositSubmission;
use super::DepositError;

const EXPIRED_REASON: &str = "expired";
const NO_AGENT_REASON: &str = "no agent available";

/// What happened to a withdrawal whose agent did not pay out in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    Reassigned { agent_id: Uuid },
    Refunded,
}

/// Pick an agent for a user's funding request. Read-only.
pub async fn match_agent(
    db: &PgPool,
    user_id: Uuid,
    method: &str,
) -> Result<AgentCandidate, DepositError> {
    let profile = profile_repo::get_profile(db, user_id)
        .await?
        .ok_or(DepositError::UserNotFound(user_id))?;

    agent_matcher::find_agent(db, method, profile.region.as_deref(), &[]).await
}

/// Re-read a previously matched (agent, account) pair, making sure it is
/// still active for the method.
pub async fn resolve_candidate(
    db: &PgPool,
    method: &str,
    agent_id: Uuid,
    account_id: Uuid,
) -> Result<AgentCandidate, DepositError> {
    agent_repo::get_candidates(db, method)
        .await?
        .into_iter()
        .find(|c| c.agent_id == agent_id && c.account_id == account_id)
        .ok_or_else(|| DepositError::NoAgentAvailable(method.to_string()))
}

/// Persist a deposit once proof of payment has been uploaded. This is the
/// first write of the deposit workflow; its `created_at` starts the
/// countdown.
pub async fn submit_deposit(
    db: &PgPool,
    user_id: Uuid,
    submission: DepositSubmission,
) -> Result<Transaction, DepositError> {
    let metadata = TransactionMetadata {
        workflow_stage: Some(WorkflowStage::AwaitingAgentConfirmation),
        payment_method: Some(submission.method.clone()),
        agent_id: Some(submission.agent.agent_id),
        payment_account_id: Some(submission.agent.account_id),
        proof_url: Some(submission.proof_url),
        ..Default::default()
    };

    let record = transaction_repo::insert_transaction(
        db,
        user_id,
        TransactionKind::Deposit,
        submission.amount,
        transaction_status::PENDING,
        &format!("Deposit via {}", submission.method),
        &metadata,
    )
    .await?;

    counter!("deposits_submitted").increment(1);
    tracing::info!(
        transaction_id = %record.id,
        user_id = %user_id,
        agent_id = %submission.agent.agent_id,
        amount = %submission.amount,
        method = %submission.method,
        "Deposit submitted"
    );

    Ok(record)
}

/// Debit the user and hand the payout to an agent.
pub async fn create_withdrawal(
    db: &PgPool,
    user_id: Uuid,
    amount: Decimal,
    method: &str,
    payout_details: &str,
    now: DateTime<Utc>,
) -> Result<Transaction, DepositError> {
    let amount = precision::currency(amount);
    if amount <= Decimal::ZERO {
        return Err(DepositError::InvalidAmount(format!(
            "withdrawal amount must be positive, got {amount}"
        )));
    }

    let mut tx = db.begin().await?;

    let profile = profile_repo::get_profile_for_update(&mut tx, user_id)
        .await?
        .ok_or(DepositError::UserNotFound(user_id))?;
    if profile.balance < amount {
        return Err(DepositError::InsufficientBalance {
            required: amount,
            available: profile.balance,
        });
    }

    let agent = agent_matcher::find_agent(&mut *tx, method, profile.region.as_deref(), &[]).await?;

    profile_repo::debit_if_sufficient(&mut tx, user_id, amount)
        .await?
        .ok_or(DepositError::InsufficientBalance {
            required: amount,
            available: profile.balance,
        })?;

    let metadata = TransactionMetadata {
        workflow_stage: Some(WorkflowStage::AwaitingAgentPayout),
        payment_method: Some(method.to_string()),
        agent_id: Some(agent.agent_id),
        payment_account_id: Some(agent.account_id),
        payout_details: Some(payout_details.to_string()),
        assigned_at: Some(now),
        ..Default::default()
    };
    let record = transaction_repo::insert_transaction(
        &mut *tx,
        user_id,
        TransactionKind::Withdrawal,
        amount,
        transaction_status::PENDING,
        &format!("Withdrawal via {method}"),
        &metadata,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        transaction_id = %record.id,
        user_id = %user_id,
        agent_id = %agent.agent_id,
        amount = %amount,
        "Withdrawal created"
    );

    Ok(record)
}

/// The assigned agent approves a deposit, or reports a withdrawal as paid.
///
/// A decision that arrives after the deadline is refused with
/// `TransactionExpired`, and the expiry the sweeper would have applied is
/// applied right away.
pub async fn confirm(
    db: &PgPool,
    agent_user_id: Uuid,
    transaction_id: Uuid,
    timeouts: &WorkflowTimeouts,
    now: DateTime<Utc>,
) -> Result<Transaction, DepositError> {
    let mut tx = db.begin().await?;

    let record = lock_for_decision(&mut tx, transaction_id).await?;
    let agent = require_assigned_agent(&mut tx, &record, agent_user_id).await?;

    if expire_if_overdue(&mut tx, &record, timeouts, now).await? {
        tx.commit().await?;
        return Err(DepositError::TransactionExpired(record.id));
    }

    let mut metadata = record.metadata.0.clone();
    let status = advance(&mut metadata, WorkflowStage::Completed)?;

    if record.kind == TransactionKind::Deposit.as_str() {
        profile_repo::credit(&mut tx, record.user_id, record.amount).await?;
        agent_repo::adjust_available_balance(&mut tx, agent.id, -record.amount).await?;
    } else {
        agent_repo::adjust_available_balance(&mut tx, agent.id, record.amount).await?;
    }

    transaction_repo::transition_pending(&mut tx, record.id, status, &metadata).await?;
    let updated = reload(&mut tx, record.id).await?;
    tx.commit().await?;

    tracing::info!(
        transaction_id = %record.id,
        kind = %record.kind,
        agent_id = %agent.id,
        amount = %record.amount,
        "Funding transaction completed"
    );

    Ok(updated)
}

/// The assigned agent turns a request down. A rejected deposit fails; a
/// declined withdrawal moves on to the next agent without a strike.
///
/// Past the deadline it is refused like a late confirmation.
pub async fn reject(
    db: &PgPool,
    agent_user_id: Uuid,
    transaction_id: Uuid,
    reason: Option<&str>,
    timeouts: &WorkflowTimeouts,
    now: DateTime<Utc>,
) -> Result<Transaction, DepositError> {
    let mut tx = db.begin().await?;

    let record = lock_for_decision(&mut tx, transaction_id).await?;
    require_assigned_agent(&mut tx, &record, agent_user_id).await?;

    if expire_if_overdue(&mut tx, &record, timeouts, now).await? {
        tx.commit().await?;
        return Err(DepositError::TransactionExpired(record.id));
    }

    if record.kind == TransactionKind::Withdrawal.as_str() {
        rotate_withdrawal(&mut tx, &record, now, false).await?;
    } else {
        let mut metadata = record.metadata.0.clone();
        let status = advance(&mut metadata, WorkflowStage::Rejected)?;
        metadata.failure_reason = Some(reason.unwrap_or("rejected by agent").to_string());
        transaction_repo::transition_pending(&mut tx, record.id, status, &metadata).await?;
        tracing::info!(transaction_id = %record.id, "Deposit rejected by agent");
    }

    let updated = reload(&mut tx, record.id).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Sweeper entry point: expire one deposit if it is still pending and past
/// its deadline. Returns whether this call expired it.
pub async fn expire_stale_deposit(
    db: &PgPool,
    transaction_id: Uuid,
    timeouts: &WorkflowTimeouts,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let mut tx = db.begin().await?;

    let Some(record) = transaction_repo::lock_pending(&mut tx, transaction_id).await? else {
        return Ok(false);
    };
    if !expiry::is_expired(now, record.created_at, timeouts.deposit) {
        return Ok(false);
    }

    let expired = expire_deposit(&mut tx, &record).await?;
    tx.commit().await?;

    Ok(expired)
}

/// Sweeper entry point: penalise and replace the agent of one withdrawal
/// whose payout window has closed, or refund it.
pub async fn rotate_stale_withdrawal(
    db: &PgPool,
    transaction_id: Uuid,
    timeouts: &WorkflowTimeouts,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<WithdrawalOutcome>> {
    let mut tx = db.begin().await?;

    let Some(record) = transaction_repo::lock_pending(&mut tx, transaction_id).await? else {
        return Ok(None);
    };
    let started = record.metadata.assigned_at.unwrap_or(record.created_at);
    if !expiry::is_expired(now, started, timeouts.withdrawal_window) {
        return Ok(None);
    }

    let outcome = rotate_withdrawal(&mut tx, &record, now, true).await?;
    tx.commit().await?;

    Ok(outcome)
}

/// Fail a pending deposit with reason "expired". Nothing was credited, so
/// nothing is refunded.
pub async fn expire_deposit(conn: &mut PgConnection, record: &Transaction) -> anyhow::Result<bool> {
    let mut metadata = record.metadata.0.clone();
    let stage = WorkflowStage::TimedOut;
    metadata.workflow_stage = Some(stage);
    metadata.failure_reason = Some(EXPIRED_REASON.to_string());

    let expired = transaction_repo::transition_pending(conn, record.id, stage.status(), &metadata).await?;
    if expired {
        counter!("deposits_expired").increment(1);
        tracing::info!(
            transaction_id = %record.id,
            user_id = %record.user_id,
            amount = %record.amount,
            "Deposit expired"
        );
    }

    Ok(expired)
}

/// Move a withdrawal off its current agent. With `penalise` the agent gets a
/// strike. Every agent ever assigned is excluded from the next pick; when
/// nobody is left the user is refunded.
pub async fn rotate_withdrawal(
    conn: &mut PgConnection,
    record: &Transaction,
    now: DateTime<Utc>,
    penalise: bool,
) -> anyhow::Result<Option<WithdrawalOutcome>> {
    let mut metadata = record.metadata.0.clone();

    if let Some(stale) = metadata.agent_id {
        if penalise {
            let strikes = agent_repo::add_strike(conn, stale).await?;
            tracing::warn!(agent_id = %stale, strikes, transaction_id = %record.id, "Agent missed payout window");
        }
        if !metadata.excluded_agents.contains(&stale) {
            metadata.excluded_agents.push(stale);
        }
    }

    let region = profile_repo::get_profile(&mut *conn, record.user_id)
        .await?
        .and_then(|p| p.region);
    let method = metadata.payment_method.clone().unwrap_or_default();

    match agent_matcher::find_agent(&mut *conn, &method, region.as_deref(), &metadata.excluded_agents)
        .await
    {
        Ok(next) => {
            metadata.agent_id = Some(next.agent_id);
            metadata.payment_account_id = Some(next.account_id);
            metadata.assigned_at = Some(now);
            metadata.reassignments += 1;
            let stage = WorkflowStage::AwaitingAgentPayout;
            metadata.workflow_stage = Some(stage);

            if !transaction_repo::transition_pending(conn, record.id, stage.status(), &metadata).await?
            {
                return Ok(None);
            }
            counter!("withdrawals_reassigned").increment(1);
            tracing::info!(
                transaction_id = %record.id,
                agent_id = %next.agent_id,
                reassignments = metadata.reassignments,
                "Withdrawal reassigned"
            );
            Ok(Some(WithdrawalOutcome::Reassigned {
                agent_id: next.agent_id,
            }))
        }
        Err(DepositError::NoAgentAvailable(_)) => {
            let stage = WorkflowStage::Refunded;
            metadata.workflow_stage = Some(stage);
            metadata.failure_reason = Some(NO_AGENT_REASON.to_string());

            if !transaction_repo::transition_pending(conn, record.id, stage.status(), &metadata).await?
            {
                return Ok(None);
            }
            let balance = profile_repo::credit(conn, record.user_id, record.amount).await?;
            counter!("withdrawals_refunded").increment(1);
            tracing::info!(
                transaction_id = %record.id,
                user_id = %record.user_id,
                amount = %record.amount,
                balance = %balance,
                "Withdrawal refunded"
            );
            Ok(Some(WithdrawalOutcome::Refunded))
        }
        Err(e) => Err(e.into()),
    }
}

async fn lock_for_decision(conn: &mut PgConnection, id: Uuid) -> Result<Transaction, DepositError> {
    let record = transaction_repo::get_transaction_for_update(conn, id)
        .await?
        .ok_or(DepositError::TransactionNotFound(id))?;

    let funding = record.kind == TransactionKind::Deposit.as_str()
        || record.kind == TransactionKind::Withdrawal.as_str();
    if !funding {
        return Err(DepositError::TransactionNotFound(id));
    }
    if record.is_terminal() {
        return Err(DepositError::InvalidTransition {
            from: record.stage(),
            to: WorkflowStage::Completed,
        });
    }
    Ok(record)
}

async fn require_assigned_agent(
    conn: &mut PgConnection,
    record: &Transaction,
    agent_user_id: Uuid,
) -> Result<Agent, DepositError> {
    let agent = agent_repo::get_agent_by_user(&mut *conn, agent_user_id)
        .await?
        .ok_or(DepositError::NotAssignedAgent(record.id))?;

    if record.metadata.agent_id != Some(agent.id) {
        return Err(DepositError::NotAssignedAgent(record.id));
    }
    Ok(agent)
}

/// If the row is past its deadline, apply the transition the sweeper would
/// have made and return true. The caller commits and refuses the decision.
async fn expire_if_overdue(
    conn: &mut PgConnection,
    record: &Transaction,
    timeouts: &WorkflowTimeouts,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let Some((started, threshold)) = timeouts.countdown(record) else {
        return Ok(false);
    };
    if !expiry::is_expired(now, started, threshold) {
        return Ok(false);
    }

    if record.kind == TransactionKind::Deposit.as_str() {
        expire_deposit(conn, record).await?;
    } else {
        rotate_withdrawal(conn, record, now, true).await?;
    }
    Ok(true)
}

/// Move the metadata to `next`, returning the row status that stage carries.
fn advance(
    metadata: &mut TransactionMetadata,
    next: WorkflowStage,
) -> Result<&'static str, DepositError> {
    let from = metadata.workflow_stage;
    match from {
        Some(stage) if stage.can_transition_to(next) => {
            metadata.workflow_stage = Some(next);
            Ok(next.status())
        }
        _ => Err(DepositError::InvalidTransition { from, to: next }),
    }
}

async fn reload(conn: &mut PgConnection, id: Uuid) -> Result<Transaction, DepositError> {
    transaction_repo::get_transaction(&mut *conn, id)
        .await?
        .ok_or(DepositError::TransactionNotFound(id))
}

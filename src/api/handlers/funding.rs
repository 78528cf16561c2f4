use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::CurrentUser;
use crate::db::{agent_repo, transaction_repo};
use crate::deposits::expiry::{self, WorkflowTimeouts};
use crate::deposits::funding;
use crate::deposits::workflow::DepositDraft;
use crate::errors::AppError;
use crate::models::{AgentCandidate, Transaction};
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct MatchBody {
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub amount: Decimal,
    pub method: String,
    pub agent_id: Uuid,
    pub account_id: Uuid,
    pub proof_url: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalBody {
    pub amount: Decimal,
    pub method: String,
    pub payout_details: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

/// A funding transaction with its live countdown.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction: Transaction,
    /// Seconds left before the current deadline; absent once terminal.
    pub remaining_secs: Option<i64>,
    pub expired: bool,
}

fn timeouts(state: &AppState) -> WorkflowTimeouts {
    *state.sweeper.timeouts()
}

/// POST /api/deposits/match — Pick the agent the user should pay.
pub async fn match_agent(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<MatchBody>,
) -> Result<Json<ApiResponse<AgentCandidate>>, AppError> {
    let agent = funding::match_agent(&state.db, user_id, &body.method).await?;
    Ok(ApiResponse::ok(agent))
}

/// POST /api/deposits — Submit proof of payment. Creates the transaction.
pub async fn submit_deposit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<DepositBody>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let agent =
        funding::resolve_candidate(&state.db, &body.method, body.agent_id, body.account_id).await?;

    let submission = DepositDraft::new(body.amount)?
        .select_method(body.method)
        .match_agent(agent)?
        .await_proof()
        .submit(body.proof_url)?;

    let record = funding::submit_deposit(&state.db, user_id, submission).await?;
    Ok(ApiResponse::ok(record))
}

/// POST /api/withdrawals — Debit the balance and assign a paying agent.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<WithdrawalBody>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let record = funding::create_withdrawal(
        &state.db,
        user_id,
        body.amount,
        &body.method,
        &body.payout_details,
        Utc::now(),
    )
    .await?;

    Ok(ApiResponse::ok(record))
}

/// GET /api/transactions/:id — Visible to the owner and the assigned agent.
pub async fn get_transaction(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionView>>, AppError> {
    let not_found = || AppError::NotFound(format!("transaction {id}"));
    let record = transaction_repo::get_transaction(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    if record.user_id != user_id {
        let agent = agent_repo::get_agent_by_user(&state.db, user_id).await?;
        let is_assigned = agent.is_some_and(|a| record.metadata.agent_id == Some(a.id));
        if !is_assigned {
            return Err(not_found());
        }
    }

    let now = Utc::now();
    let countdown = if record.is_terminal() {
        None
    } else {
        timeouts(&state).countdown(&record)
    };
    let view = TransactionView {
        remaining_secs: countdown
            .map(|(started, threshold)| expiry::remaining(now, started, threshold).num_seconds()),
        expired: countdown
            .is_some_and(|(started, threshold)| expiry::is_expired(now, started, threshold)),
        transaction: record,
    };

    Ok(ApiResponse::ok(view))
}

/// POST /api/transactions/:id/confirm — Assigned agent confirms.
pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser(agent_user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let record = funding::confirm(&state.db, agent_user_id, id, &timeouts(&state), Utc::now()).await?;
    Ok(ApiResponse::ok(record))
}

/// POST /api/transactions/:id/reject — Assigned agent declines.
pub async fn reject(
    State(state): State<AppState>,
    CurrentUser(agent_user_id): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let record = funding::reject(
        &state.db,
        agent_user_id,
        id,
        reason.as_deref(),
        &timeouts(&state),
        Utc::now(),
    )
    .await?;

    Ok(ApiResponse::ok(record))
}

/// GET /api/agent/transactions — Requests waiting on the calling agent.
pub async fn agent_queue(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, AppError> {
    let agent = agent_repo::get_agent_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("caller is not an agent".into()))?;

    let pending = transaction_repo::get_pending_for_agent(&state.db, agent.id).await?;
    Ok(ApiResponse::ok(pending))
}

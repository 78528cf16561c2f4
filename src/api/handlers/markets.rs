use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::amm::Quote;
use crate::api::auth::CurrentUser;
use crate::db::trade_repo;
use crate::errors::AppError;
use crate::execution::trade_executor::{self, TradeReceipt};
use crate::execution::TradeRequest;
use crate::models::{Outcome, Side, Trade};
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct TradeBody {
    pub outcome_id: Option<Uuid>,
    pub outcome: Outcome,
    pub side: Side,
    pub amount: Decimal,
}

/// POST /api/markets/:id/quote — Price a trade without executing it.
pub async fn quote(
    State(state): State<AppState>,
    Path(market_id): Path<Uuid>,
    Json(body): Json<TradeBody>,
) -> Result<Json<ApiResponse<Quote>>, AppError> {
    let quote = trade_executor::quote_trade(
        &state.db,
        market_id,
        body.outcome_id,
        body.outcome,
        body.side,
        body.amount,
    )
    .await?;

    Ok(ApiResponse::ok(quote))
}

/// POST /api/markets/:id/trades — Execute a trade for the calling user.
pub async fn trade(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(market_id): Path<Uuid>,
    Json(body): Json<TradeBody>,
) -> Result<Json<ApiResponse<TradeReceipt>>, AppError> {
    let request = TradeRequest {
        user_id,
        market_id,
        outcome_id: body.outcome_id,
        outcome: body.outcome,
        side: body.side,
        amount: body.amount,
    };

    let receipt = trade_executor::execute_trade(&state.db, &request).await?;
    Ok(ApiResponse::ok(receipt))
}

/// GET /api/markets/:id/trades — The calling user's ledger in one market.
pub async fn my_trades(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(market_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let trades = trade_repo::get_user_trades(&state.db, user_id, market_id).await?;
    Ok(ApiResponse::ok(trades))
}

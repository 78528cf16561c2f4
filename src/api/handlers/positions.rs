use axum::extract::State;
use axum::Json;

use crate::api::auth::CurrentUser;
use crate::db::position_repo;
use crate::errors::AppError;
use crate::models::Position;
use crate::AppState;

use super::ApiResponse;

/// GET /api/positions — Open positions of the calling user.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Position>>>, AppError> {
    let positions = position_repo::get_user_positions(&state.db, user_id).await?;
    Ok(ApiResponse::ok(positions))
}

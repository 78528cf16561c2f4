use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// POST /api/control/sweep — Run one sweep now, unless one is in flight.
pub async fn sweep(State(state): State<AppState>) -> impl IntoResponse {
    match state.sweeper.sweep_once().await {
        Some(report) => {
            tracing::info!(changed = report.changed(), "Manual sweep via control API");
            (StatusCode::OK, Json(json!({ "status": "completed", "report": report })))
        }
        None => (
            StatusCode::CONFLICT,
            Json(json!({ "status": "skipped", "error": "a sweep is already running" })),
        ),
    }
}

/// GET /api/control/status — Sweeper and workflow settings.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let last = state.sweeper.last_sweep().await;

    Json(json!({
        "sweeper_enabled": state.config.sweeper_enabled,
        "sweep_interval_secs": state.config.sweep_interval_secs,
        "sweep_running": state.sweeper.is_running(),
        "last_sweep": last,
        "deposit_timeout_secs": state.config.deposit_timeout_secs,
        "withdrawal_agent_window_secs": state.config.withdrawal_agent_window_secs,
    }))
}

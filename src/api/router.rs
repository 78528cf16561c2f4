use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes — no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics));

    // Protected API routes — require Bearer token when API_TOKEN is set
    let protected = Router::new()
        // Trading
        .route("/api/markets/:id/quote", post(handlers::markets::quote))
        .route(
            "/api/markets/:id/trades",
            get(handlers::markets::my_trades).post(handlers::markets::trade),
        )
        .route("/api/positions", get(handlers::positions::list))
        // Funding
        .route("/api/deposits/match", post(handlers::funding::match_agent))
        .route("/api/deposits", post(handlers::funding::submit_deposit))
        .route("/api/withdrawals", post(handlers::funding::create_withdrawal))
        .route("/api/transactions/:id", get(handlers::funding::get_transaction))
        .route("/api/transactions/:id/confirm", post(handlers::funding::confirm))
        .route("/api/transactions/:id/reject", post(handlers::funding::reject))
        .route("/api/agent/transactions", get(handlers::funding::agent_queue))
        // Control
        .route("/api/control/sweep", post(handlers::control::sweep))
        .route("/api/control/status", get(handlers::control::status))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

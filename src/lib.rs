pub mod amm;
pub mod api;
pub mod config;
pub mod db;
pub mod deposits;
pub mod errors;
pub mod execution;
pub mod metrics;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::timeout_sweeper::TimeoutSweeper;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub sweeper: Arc<TimeoutSweeper>,
}

impl AppState {
    pub fn new(
        db: sqlx::PgPool,
        config: AppConfig,
        metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        let sweeper = Arc::new(TimeoutSweeper::from_config(db.clone(), &config));
        Self {
            db,
            config,
            metrics_handle,
            sweeper,
        }
    }
}

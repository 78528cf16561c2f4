use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,

    // Bearer token for /api routes; unset disables the check
    pub api_token: Option<String>,

    // Background sweeper
    pub sweeper_enabled: bool,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,

    // Funding workflow deadlines
    pub deposit_timeout_secs: u64,
    pub withdrawal_agent_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(10),

            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),

            sweeper_enabled: env::var("SWEEPER_ENABLED")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
            sweep_batch_size: env::var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "200".into())
                .parse()
                .unwrap_or(200),

            deposit_timeout_secs: env::var("DEPOSIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "1800".into())
                .parse()
                .unwrap_or(1800),
            withdrawal_agent_window_secs: env::var("WITHDRAWAL_AGENT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
        })
    }

    /// Config for tests and tools that never read the environment.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 0,
            db_max_connections: 5,
            api_token: None,
            sweeper_enabled: false,
            sweep_interval_secs: 30,
            sweep_batch_size: 200,
            deposit_timeout_secs: 1800,
            withdrawal_agent_window_secs: 60,
        }
    }
}

use std::time::Duration;

use clap::Parser;

/// Runtime configuration of the fulfillment demo
#[derive(Debug, Clone, Parser)]
#[command(name = "order_fulfillment", about = "Order fulfillment and inventory engine", long_about = None)]
pub struct AppConfig {
    /// PostgreSQL connection string; the in-memory store is used when unset
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub database_max_connections: u32,

    /// Upper bound on one checkout, in milliseconds
    #[arg(long, env = "CHECKOUT_TIMEOUT_MS", default_value_t = 5000)]
    pub checkout_timeout_ms: u64,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    #[arg(long, env = "METRICS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub metrics_enabled: bool,

    /// Tracing filter directives (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info,order_fulfillment=debug")]
    pub log_filter: String,
}

impl AppConfig {
    /// Load configuration from environment and CLI arguments
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }
}

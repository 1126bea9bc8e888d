//! Config surface (spec.md §6). Grounded on composable-rust's `Config::from_env`
//! (`examples/ticketing/src/config.rs`): one `env::var(...).ok().and_then(|s|
//! s.parse().ok()).unwrap_or(default)` per field, nested by concern. Loaded
//! once at startup via `dotenvy`, the teacher's `.env` loading mechanism.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub queue_capacity: usize,
    pub hold_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub page_size: i64,
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_retries: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_period: Duration,
}

/// Top-level config surface assembled at startup. `payment`/`notification`
/// per-adapter config live on their own port structs
/// (`ports::payment::PaymentConfig`, `ports::notification::NotificationConfig`)
/// so each adapter owns its own `Display` redaction.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub inventory: InventoryConfig,
    pub sweeper: SweeperConfig,
    pub outbox: OutboxConfig,
    pub server: ServerConfig,
    pub payment: crate::ports::payment::PaymentConfig,
    pub notification: crate::ports::notification::NotificationConfig,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parsed(key, default_secs))
}

impl Config {
    /// Loads from environment variables (populated by `dotenvy` in
    /// development), falling back to the defaults spec.md §6 states
    /// explicitly. Panics only if `DATABASE_URL` is absent in a context where
    /// no default makes sense — every other field has a safe default.
    pub fn from_env() -> Self {
        Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 10),
            },
            inventory: InventoryConfig {
                queue_capacity: env_parsed("INVENTORY_QUEUE_CAPACITY", 500),
                hold_duration: env_secs("INVENTORY_HOLD_DURATION_SECS", 30 * 60),
            },
            sweeper: SweeperConfig {
                interval: env_secs("SWEEPER_INTERVAL_SECS", 60),
                page_size: env_parsed("SWEEPER_PAGE_SIZE", 100),
            },
            outbox: OutboxConfig {
                poll_interval: env_secs("OUTBOX_POLL_INTERVAL_SECS", 5),
                batch_size: env_parsed("OUTBOX_BATCH_SIZE", 100),
                max_retries: env_parsed("OUTBOX_MAX_RETRIES", 3),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parsed("PORT", 8000),
                shutdown_grace_period: env_secs("SHUTDOWN_GRACE_PERIOD_SECS", 30),
            },
            payment: crate::ports::payment::PaymentConfig {
                api_key: env::var("PAYMENT_API_KEY").unwrap_or_else(|_| "dev-mock-key".to_string()),
                product_id: env::var("PAYMENT_PRODUCT_ID").unwrap_or_else(|_| "flight-seat".to_string()),
                base_url: env::var("PAYMENT_BASE_URL")
                    .unwrap_or_else(|_| "https://payments.example.test".to_string()),
                timeout_secs: env_parsed("PAYMENT_TIMEOUT_SECS", 30),
                max_retries: env_parsed("PAYMENT_MAX_RETRIES", 3),
            },
            notification: crate::ports::notification::NotificationConfig {
                api_key: env::var("NOTIFICATION_API_KEY").unwrap_or_else(|_| "dev-mock-key".to_string()),
                sender: env::var("NOTIFICATION_SENDER")
                    .unwrap_or_else(|_| "no-reply@example.test".to_string()),
                timeout_secs: env_parsed("NOTIFICATION_TIMEOUT_SECS", 10),
                max_retries: env_parsed("NOTIFICATION_MAX_RETRIES", 3),
            },
        }
    }
}

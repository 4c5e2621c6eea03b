use std::env;
use std::time::Duration;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub host: String,
    pub port: u16,
    /// Absent means the analytics layer runs without a cache and computes
    /// every aggregate directly.
    pub redis_url: Option<String>,
    pub payment_api_url: String,
    pub payment_api_key: String,
    pub payment_timeout: Duration,
}

impl Config {
    /// Read configuration from the environment. Required variables panic at
    /// startup; optional ones fall back to defaults.
    pub fn from_env() -> Self {
        let payment_timeout_secs: u64 = env::var("PAYMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .expect("PAYMENT_TIMEOUT_SECS must be a valid number");

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            db_pool_size: env::var("DB_POOL_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DB_POOL_SIZE must be a valid number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            redis_url: env::var("REDIS_URL").ok(),
            payment_api_url: env::var("PAYMENT_API_URL").expect("PAYMENT_API_URL must be set"),
            payment_api_key: env::var("PAYMENT_API_KEY").expect("PAYMENT_API_KEY must be set"),
            payment_timeout: Duration::from_secs(payment_timeout_secs),
        }
    }
}

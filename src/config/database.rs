use crate::core::{AppError, Result};
use serde::Deserialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// MySQL settings, read only when `STORAGE=mysql`
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Connections kept open while idle
    pub pool_size: u32,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").map_err(|_| {
            AppError::Configuration("DATABASE_URL is required for mysql storage".to_string())
        })?;

        Ok(DatabaseConfig {
            url,
            pool_size: parse_or("DATABASE_POOL_SIZE", 5)?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
        })
    }

    /// Pool settings for the loan store. Each unit of work pins one
    /// connection until it commits or rolls back.
    fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.pool_size)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
            .test_before_acquire(true)
    }

    /// Connect to MySQL
    pub async fn create_pool(&self) -> Result<MySqlPool> {
        let pool = self.pool_options().connect(&self.url).await?;
        Ok(pool)
    }

    /// Create the loan tables from `migrations/` if they are missing
    pub async fn migrate(pool: &MySqlPool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

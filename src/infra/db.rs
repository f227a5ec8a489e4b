use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

/// Shared Postgres handle. Every service clones this; the pool itself is
/// reference-counted, so clones are cheap.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// An idle timeout of zero recycles every idle connection on acquire. The
/// integration harness sets it to zero because the pool outlives each test's
/// tokio runtime and connections created on a dropped runtime are unusable.
fn pool_options(config: &AppConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            http_addr: "127.0.0.1:0".into(),
            database_url: "postgres://localhost/aviary".into(),
            redis_url: "redis://127.0.0.1/".into(),
            s3_endpoint: "http://127.0.0.1:9000".into(),
            s3_public_endpoint: None,
            s3_region: "us-east-1".into(),
            s3_bucket: "aviary-media".into(),
            db_max_connections: 25,
            db_connect_timeout_seconds: 5,
            db_idle_timeout_seconds: 300,
            db_max_lifetime_seconds: 1800,
            upload_max_bytes: 10_485_760,
            paseto_access_key: [0u8; 32],
            paseto_refresh_key: [1u8; 32],
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
        }
    }

    #[test]
    fn pool_options_apply_config_knobs() {
        let mut config = test_config();
        config.db_max_connections = 7;
        config.db_idle_timeout_seconds = 0;

        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_idle_timeout(), Some(Duration::ZERO));
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
    }
}

use serde::Deserialize;
use std::env;

use crate::constants::{DEFAULT_REPLAY_CACHE_TTL_SECS, STORE_MEMORY, STORE_POSTGRES};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Storage
    pub store: String,
    pub database_url: String,
    pub database_max_connections: u32,

    // Replay cache
    pub redis_url: Option<String>,
    pub replay_cache_ttl_secs: u64,

    // Auth
    pub jwt_secret: String,
    pub engine_secret: String,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let store = env::var("STORE")
            .unwrap_or_else(|_| STORE_POSTGRES.to_string())
            .trim()
            .to_ascii_lowercase();
        let database_url = if store == STORE_MEMORY {
            env::var("DATABASE_URL").unwrap_or_default()
        } else {
            env::var("DATABASE_URL")?
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            store,
            database_url,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            redis_url: env::var("REDIS_URL")
                .ok()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            replay_cache_ttl_secs: env::var("REPLAY_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REPLAY_CACHE_TTL_SECS),

            jwt_secret: env::var("JWT_SECRET")?,
            engine_secret: env::var("ENGINE_SECRET")?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store != STORE_POSTGRES && self.store != STORE_MEMORY {
            anyhow::bail!(
                "STORE must be '{}' or '{}', got '{}'",
                STORE_POSTGRES,
                STORE_MEMORY,
                self.store
            );
        }
        if self.uses_postgres() && self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET is empty");
        }
        if self.engine_secret.trim().is_empty() {
            anyhow::bail!("ENGINE_SECRET is empty");
        }

        if self.jwt_secret.contains("super_secret") || self.engine_secret.contains("super_secret") {
            tracing::warn!("Detected dev credentials in config");
        }
        if self.jwt_secret == self.engine_secret {
            tracing::warn!("JWT_SECRET and ENGINE_SECRET are identical");
        }
        if !self.uses_postgres() && !self.is_development() {
            tracing::warn!("In-memory store outside development; matches vanish on restart");
        }
        if self.replay_cache_ttl_secs == 0 {
            tracing::warn!("REPLAY_CACHE_TTL_SECS is 0; replays are recomputed on every read");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn uses_postgres(&self) -> bool {
        self.store == STORE_POSTGRES
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        store: STORE_MEMORY.to_string(),
        database_url: String::new(),
        database_max_connections: 1,
        redis_url: None,
        replay_cache_ttl_secs: DEFAULT_REPLAY_CACHE_TTL_SECS,
        jwt_secret: "test_jwt_secret".to_string(),
        engine_secret: "test_engine_secret".to_string(),
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_does_not_need_database_url() {
        let config = test_config();
        assert!(!config.uses_postgres());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_store_requires_database_url() {
        let config = Config {
            store: STORE_POSTGRES.to_string(),
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_store_is_rejected() {
        let config = Config {
            store: "sqlite".to_string(),
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn secrets_are_required() {
        let config = Config {
            engine_secret: "  ".to_string(),
            ..test_config()
        };
        assert!(config.validate().is_err());
    }
}

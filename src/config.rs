use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Base URL of the external user/identity service (USER_AUTH RPC).
    pub auth_service_url: String,
    /// Round-trip budget for the identity bridge; a timeout is treated as
    /// an authentication failure, never retried.
    pub auth_timeout_ms: u64,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let auth_service_url = env::var("AUTH_SERVICE_URL")
            .map_err(|_| crate::error::AppError::Config("AUTH_SERVICE_URL missing".into()))?;
        let auth_timeout_ms = env::var("AUTH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            auth_service_url,
            auth_timeout_ms,
            port,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/chat_test".into(),
            auth_service_url: "http://127.0.0.1:4010".into(),
            auth_timeout_ms: 1_000,
            port: 3000,
        }
    }
}

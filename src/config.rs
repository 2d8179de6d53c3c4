use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Password reset settings. `expose_token` puts the plaintext reset token
/// into the forgot-password response and must stay off outside dev/test.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    pub url_base: String,
    pub expose_token: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = format!(
            "{}:{}",
            std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
        )
        .parse()
        .context("APP_HOST/APP_PORT")?;
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "melodyverse".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "melodyverse-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };
        let reset = ResetConfig {
            ttl_minutes: env_i64("RESET_TOKEN_TTL_MINUTES").unwrap_or(30),
            url_base: std::env::var("RESET_URL_BASE")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            expose_token: std::env::var("EXPOSE_RESET_TOKEN")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        Ok(Self {
            listen_addr,
            database_url,
            jwt,
            reset,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

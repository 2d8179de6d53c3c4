use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions};

use crate::auth::{
    memory::MemoryUserStore,
    notifier::{LogNotifier, ResetNotifier},
    repo::{PgUserStore, UserStore},
};
use crate::config::AppConfig;

/// Schema that owns the uniqueness and reset-pair constraints; startup fails without it.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = if config.uses_memory_store() {
            tracing::warn!("using in-memory user store; data is lost on restart");
            Arc::new(MemoryUserStore::new())
        } else {
            let db = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&config.database_url)
                .await
                .context("connect to database")?;

            MIGRATOR
                .run(&db)
                .await
                .context("run migrations")?;
            Arc::new(PgUserStore::new(db))
        };

        let notifier = Arc::new(LogNotifier::new(config.reset.url_base.clone()));
        if config.reset.expose_token {
            tracing::warn!("EXPOSE_RESET_TOKEN is on; reset tokens are returned in responses");
        }

        Ok(Self::from_parts(store, config, notifier))
    }

    pub fn from_parts(
        store: Arc<dyn UserStore>,
        config: Arc<AppConfig>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        Self {
            store,
            config,
            notifier,
        }
    }

    #[cfg(test)]
    /// In-memory state with test settings and the reset token exposed.
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, ResetConfig};

        let config = Arc::new(AppConfig {
            listen_addr: ([127, 0, 0, 1], 0).into(),
            database_url: "memory://".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            reset: ResetConfig {
                ttl_minutes: 30,
                url_base: "http://localhost:3000".into(),
                expose_token: true,
            },
        });

        Self::from_parts(
            Arc::new(MemoryUserStore::new()),
            config.clone(),
            Arc::new(LogNotifier::new(config.reset.url_base.clone())),
        )
    }

    #[cfg(test)]
    /// Copy of `self` whose config has been adjusted by `f`, sharing the same store.
    pub fn with_config(&self, f: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = (*self.config).clone();
        f(&mut config);
        Self {
            store: self.store.clone(),
            config: Arc::new(config),
            notifier: self.notifier.clone(),
        }
    }
}

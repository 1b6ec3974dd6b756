use std::sync::Arc;

use crate::auth::{
    jwt::JwtKeys,
    notify::{LogNotifier, Notifier},
    password::Hasher,
    repo::{CredentialStore, PgCredentialStore},
    services::AuthService,
};
use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let store = Arc::new(PgCredentialStore::new(pool)) as Arc<dyn CredentialStore>;
        let notifier = Arc::new(LogNotifier) as Arc<dyn Notifier>;
        Self::from_parts(config, store, notifier)
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let auth = AuthService::new(
            store,
            Hasher::new(&config.hash)?,
            JwtKeys::new(&config.jwt),
            notifier,
            config.reset.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
        })
    }

    /// State over an in-memory store, for router tests.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::auth::memory::MemoryStore>) {
        let store = Arc::new(crate::auth::memory::MemoryStore::new());
        let state = Self::from_parts(
            crate::config::test_config(),
            store.clone(),
            Arc::new(LogNotifier),
        )
        .expect("test config is valid");
        (state, store)
    }
}

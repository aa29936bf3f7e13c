use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;

use crate::auth::{
    jwt::JwtKeys,
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
}

impl AppState {
    /// Open the Postgres store and migrate it. Nothing is served until this
    /// returns.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let keys = JwtKeys::from_config(&config.jwt)?;

        let store = PgUserStore::open(&config.db)
            .await
            .context("connect to database")?;
        store
            .ensure_schema()
            .await
            .context("ensure users schema")?;

        Ok(Self::from_parts(Arc::new(store), keys))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self {
            auth: AuthService::new(store, keys),
        }
    }

    /// State backed by [`MemoryUserStore`], for tests and local experiments.
    pub fn in_memory(secret: &str) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(secret)?;
        Ok(Self::from_parts(Arc::new(MemoryUserStore::new()), keys))
    }

    pub async fn close(&self) {
        self.auth.store().close().await;
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.keys().clone()
    }
}

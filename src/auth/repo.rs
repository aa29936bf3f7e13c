use std::{future::Future, str::FromStr, time::Duration};

use axum::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::config::DbConfig;

/// Key for the advisory lock that serializes schema setup across processes.
const SCHEMA_LOCK_KEY: i64 = 0x6e65_7875_7366_6c6f;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("store query timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Database(e)
    }
}

/// Durable mapping from normalized email to credentials.
///
/// Callers pass emails already lowercased. `insert` must enforce uniqueness
/// itself: a prior `find_by_email` miss is no guarantee under concurrency.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the users table if it is absent. Safe to run repeatedly and
    /// from several processes at once.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn close(&self) {}
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgUserStore {
    /// Build the pool and check it answers before handing it out.
    pub async fn open(cfg: &DbConfig) -> Result<Self, StoreError> {
        let mut options = PgConnectOptions::from_str(&cfg.url)?;
        if cfg.relaxed_tls {
            // Require encrypts without verifying the server certificate.
            options = options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.query_timeout)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool, cfg.query_timeout);
        store
            .bounded(sqlx::query("SELECT 1").execute(&store.pool))
            .await?;
        info!(max_connections = cfg.max_connections, "connected to postgres");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(res) => res.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(SCHEMA_LOCK_KEY)
                .execute(&mut *tx)
                .await?;
            sqlx::query(CREATE_USERS).execute(&mut *tx).await?;
            tx.commit().await
        })
        .await?;
        debug!("users schema ensured");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (email, password_hash)
                VALUES ($1, $2)
                RETURNING id, email, password_hash, created_at
                "#,
            )
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres pool closed");
    }
}

//! PostgreSQL storage backend for the OVL authorization server.
//!
//! Implements every `ovl-auth` storage contract on top of sqlx:
//!
//! - the four token stores share one row shape across four tables
//! - session upsert and token insert run in a single transaction
//! - the JTI replay guard is one conditional upsert
//! - scope/audience lists persist through the `ovl_auth::codec` TEXT codec
//!
//! # Schema
//!
//! [`PostgresAuthStore::ensure_schema`] bootstraps all tables with an
//! embedded idempotent DDL script; there is no migration framework.
//!
//! # Example
//!
//! ```ignore
//! use ovl_auth::storage::ClientRegistry;
//! use ovl_auth_postgres::PostgresAuthStore;
//!
//! let store = PostgresAuthStore::connect("postgres://localhost/ovl_auth").await?;
//! store.ensure_schema().await?;
//! let client = store.get_client("client-one").await?;
//! ```

use std::sync::Arc;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;
use tracing::debug;

use ovl_auth::{StoreError, StoreResult};

mod client;
mod config;
mod jti;
mod session;
mod token;
mod user;

pub use config::PostgresConfig;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

/// Embedded schema bootstrap script.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// PostgreSQL-backed implementation of the `ovl-auth` storage contracts.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone)]
pub struct PostgresAuthStore {
    pool: Arc<PgPool>,
}

impl PostgresAuthStore {
    /// Creates a store from an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connects with default pool settings.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let config = PostgresConfig {
            database_url: database_url.to_string(),
            ..PostgresConfig::default()
        };
        Self::connect_with(&config).await
    }

    /// Connects using the given configuration.
    pub async fn connect_with(config: &PostgresConfig) -> StoreResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                StoreError::unavailable(format!("Failed to connect to PostgreSQL: {e}"))
            })?;
        debug!(
            max_connections = config.max_connections,
            "PostgreSQL connection pool created"
        );
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates all tables if they do not exist. Idempotent.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx_core::raw_sql::raw_sql(SCHEMA_SQL)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        debug!("Auth schema ensured");
        Ok(())
    }
}

/// Maps driver errors into the storage taxonomy.
pub(crate) fn map_db_err(e: sqlx_core::Error) -> StoreError {
    if let sqlx_core::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::invalid(db_err.message().to_string());
        }
    }
    StoreError::unavailable(e.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_script_covers_all_tables() {
        for table in [
            "users",
            "clients",
            "client_assertion_jtis",
            "sessions",
            "authorization_codes",
            "access_tokens",
            "refresh_tokens",
            "pkce_requests",
        ] {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "schema.sql is missing {table}"
            );
        }
    }

    #[test]
    fn test_driver_errors_map_to_unavailable() {
        let err = map_db_err(sqlx_core::Error::RowNotFound);
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_pool_errors_are_unavailable() {
        let err = map_db_err(sqlx_core::Error::PoolTimedOut);
        assert!(err.is_unavailable());
    }
}

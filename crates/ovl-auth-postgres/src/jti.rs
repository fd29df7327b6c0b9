//! JWT-bearer assertion replay guard.
//!
//! The first-use check is a single conditional upsert: the insert wins when
//! the jti is new, the update wins when the previous window has expired, and
//! a live row yields no returned value. Concurrent duplicates therefore
//! resolve to exactly one winner inside PostgreSQL.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use ovl_auth::storage::JtiStore;
use ovl_auth::{StoreError, StoreResult};

use crate::{PostgresAuthStore, map_db_err};

#[async_trait]
impl JtiStore for PostgresAuthStore {
    #[instrument(skip(self))]
    async fn verify_jti(&self, jti: &str) -> StoreResult<()> {
        let live: Option<String> = query_scalar(
            "SELECT jti FROM client_assertion_jtis WHERE jti = $1 AND expires_at > NOW()",
        )
        .bind(jti)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        if live.is_some() {
            return Err(StoreError::replay_detected(jti));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn check_and_record_jti(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let recorded: Option<String> = query_scalar(
            r#"
            INSERT INTO client_assertion_jtis (id, jti, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO UPDATE SET
                id = EXCLUDED.id,
                expires_at = EXCLUDED.expires_at
            WHERE client_assertion_jtis.expires_at <= NOW()
            RETURNING jti
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(jti)
        .bind(expires_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        if recorded.is_none() {
            warn!(jti = %jti, "Client assertion replay detected");
            return Err(StoreError::replay_detected(jti));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired_jtis(&self) -> StoreResult<u64> {
        let result = query("DELETE FROM client_assertion_jtis WHERE expires_at <= NOW()")
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;

        let removed = result.rows_affected();
        debug!(removed, "Expired client assertion jtis removed");
        Ok(removed)
    }
}

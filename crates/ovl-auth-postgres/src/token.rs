//! Token row persistence shared by the four token tables.
//!
//! The tables carry identical columns; only the table name and the
//! lookup-key column differ. Create upserts the embedded session and inserts
//! the token row in one transaction, so a losing duplicate create leaves no
//! orphan session behind.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;

use ovl_auth::storage::{
    AccessTokenStore, AuthorizeCodeStore, PkceRequestStore, RefreshTokenStore,
};
use ovl_auth::{AuthRequest, RecordMeta, StoreError, StoreResult, TokenRecord, codec};

use crate::session::upsert_session;
use crate::{PostgresAuthStore, map_db_err};

/// Table-specific pieces of the shared token row shape.
#[derive(Clone, Copy)]
struct TokenTable {
    table: &'static str,
    /// Column holding the lookup key.
    lookup: &'static str,
    /// Entity name used in error messages.
    entity: &'static str,
}

const AUTHORIZE_CODES: TokenTable = TokenTable {
    table: "authorization_codes",
    lookup: "code",
    entity: "Authorization code",
};

const ACCESS_TOKENS: TokenTable = TokenTable {
    table: "access_tokens",
    lookup: "signature",
    entity: "Access token",
};

const REFRESH_TOKENS: TokenTable = TokenTable {
    table: "refresh_tokens",
    lookup: "signature",
    entity: "Refresh token",
};

const PKCE_REQUESTS: TokenTable = TokenTable {
    table: "pkce_requests",
    lookup: "signature",
    entity: "PKCE request",
};

type TokenRow = (
    String,                  // id
    bool,                    // active
    OffsetDateTime,          // requested_at
    String,                  // requested_scope
    String,                  // granted_scope
    String,                  // requested_audience
    String,                  // granted_audience
    serde_json::Value,       // form
    String,                  // client_id
    String,                  // session_id
    OffsetDateTime,          // created_at
    OffsetDateTime,          // updated_at
    Option<OffsetDateTime>,  // deleted_at
);

fn record_from_row(row: TokenRow) -> StoreResult<TokenRecord> {
    let (
        id,
        active,
        requested_at,
        requested_scope,
        granted_scope,
        requested_audience,
        granted_audience,
        form,
        client_id,
        session_id,
        created_at,
        updated_at,
        deleted_at,
    ) = row;

    Ok(TokenRecord {
        id,
        active,
        requested_at,
        requested_scope: codec::from_field(&requested_scope)?,
        granted_scope: codec::from_field(&granted_scope)?,
        requested_audience: codec::from_field(&requested_audience)?,
        granted_audience: codec::from_field(&granted_audience)?,
        form: serde_json::from_value(form)?,
        client_id,
        session_id,
        meta: RecordMeta {
            created_at,
            updated_at,
            deleted_at,
        },
    })
}

impl PostgresAuthStore {
    async fn create_token(
        &self,
        t: TokenTable,
        lookup: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        let record = TokenRecord::from_request(request);
        let requested_scope = codec::to_field(&record.requested_scope)?;
        let granted_scope = codec::to_field(&record.granted_scope)?;
        let requested_audience = codec::to_field(&record.requested_audience)?;
        let granted_audience = codec::to_field(&record.granted_audience)?;
        let form = serde_json::to_value(&record.form)?;

        let mut tx = self.pool().begin().await.map_err(map_db_err)?;
        upsert_session(&mut tx, &request.session).await?;

        let sql = format!(
            r#"
            INSERT INTO {} (id, active, {}, requested_at, requested_scope, granted_scope,
                            requested_audience, granted_audience, form, client_id, session_id,
                            created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            "#,
            t.table, t.lookup
        );
        // An early return drops tx, rolling the session upsert back.
        query(&sql)
            .bind(&record.id)
            .bind(record.active)
            .bind(lookup)
            .bind(record.requested_at)
            .bind(&requested_scope)
            .bind(&granted_scope)
            .bind(&requested_audience)
            .bind(&granted_audience)
            .bind(&form)
            .bind(&record.client_id)
            .bind(&record.session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx_core::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    StoreError::conflict(format!("{} already exists", t.entity))
                } else {
                    map_db_err(e)
                }
            })?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn fetch_token(&self, t: TokenTable, lookup: &str) -> StoreResult<TokenRecord> {
        let sql = format!(
            "SELECT id, active, requested_at, requested_scope, granted_scope, \
             requested_audience, granted_audience, form, client_id, session_id, \
             created_at, updated_at, deleted_at \
             FROM {} WHERE {} = $1 AND deleted_at IS NULL",
            t.table, t.lookup
        );
        let row: Option<TokenRow> = query_as(&sql)
            .bind(lookup)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        // Lookup keys are secret material, so errors name only the entity.
        let Some(row) = row else {
            return Err(StoreError::not_found(t.entity));
        };
        record_from_row(row)
    }

    /// Rebuilds the stored request from a token row, loading its session
    /// (with user) and client.
    async fn hydrate_request(&self, record: TokenRecord) -> StoreResult<AuthRequest> {
        let session = self.load_session(&record.session_id).await?;
        let client = self
            .find_client(&record.client_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Client '{}'", record.client_id)))?;
        Ok(record.into_request(client, session))
    }

    async fn get_token(&self, t: TokenTable, lookup: &str) -> StoreResult<(bool, AuthRequest)> {
        let record = self.fetch_token(t, lookup).await?;
        let active = record.active;
        let request = self.hydrate_request(record).await?;
        Ok((active, request))
    }

    async fn invalidate_token(&self, t: TokenTable, request_id: &str) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
            t.table
        );
        let result = query(&sql)
            .bind(request_id)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "{} for request '{}'",
                t.entity, request_id
            )));
        }
        Ok(())
    }

    async fn delete_token(&self, t: TokenTable, lookup: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = $1", t.table, t.lookup);
        let result = query(&sql)
            .bind(lookup)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(t.entity));
        }
        Ok(())
    }
}

// ============================================================================
// Authorization codes
// ============================================================================

#[async_trait]
impl AuthorizeCodeStore for PostgresAuthStore {
    #[instrument(skip(self, code, request), fields(request_id = %request.id))]
    async fn create_authorize_code_session(
        &self,
        code: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(AUTHORIZE_CODES, code, request).await
    }

    #[instrument(skip_all)]
    async fn get_authorize_code_session(&self, code: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(AUTHORIZE_CODES, code).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::invalidated_code(request))
        }
    }

    #[instrument(skip(self))]
    async fn invalidate_authorize_code_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(AUTHORIZE_CODES, request_id).await
    }

    #[instrument(skip_all)]
    async fn delete_authorize_code_session(&self, code: &str) -> StoreResult<()> {
        self.delete_token(AUTHORIZE_CODES, code).await
    }
}

// ============================================================================
// Access tokens
// ============================================================================

#[async_trait]
impl AccessTokenStore for PostgresAuthStore {
    #[instrument(skip(self, signature, request), fields(request_id = %request.id))]
    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(ACCESS_TOKENS, signature, request).await
    }

    #[instrument(skip_all)]
    async fn get_access_token_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(ACCESS_TOKENS, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    #[instrument(skip(self))]
    async fn invalidate_access_token_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(ACCESS_TOKENS, request_id).await
    }

    #[instrument(skip_all)]
    async fn delete_access_token_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(ACCESS_TOKENS, signature).await
    }
}

// ============================================================================
// Refresh tokens
// ============================================================================

#[async_trait]
impl RefreshTokenStore for PostgresAuthStore {
    #[instrument(skip(self, signature, request), fields(request_id = %request.id))]
    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(REFRESH_TOKENS, signature, request).await
    }

    #[instrument(skip_all)]
    async fn get_refresh_token_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(REFRESH_TOKENS, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    #[instrument(skip(self))]
    async fn invalidate_refresh_token_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(REFRESH_TOKENS, request_id).await
    }

    #[instrument(skip_all)]
    async fn delete_refresh_token_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(REFRESH_TOKENS, signature).await
    }
}

// ============================================================================
// PKCE request records
// ============================================================================

#[async_trait]
impl PkceRequestStore for PostgresAuthStore {
    #[instrument(skip(self, signature, request), fields(request_id = %request.id))]
    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(PKCE_REQUESTS, signature, request).await
    }

    #[instrument(skip_all)]
    async fn get_pkce_request_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(PKCE_REQUESTS, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    #[instrument(skip(self))]
    async fn invalidate_pkce_request_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(PKCE_REQUESTS, request_id).await
    }

    #[instrument(skip_all)]
    async fn delete_pkce_request_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(PKCE_REQUESTS, signature).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_record_from_row_decodes_lists_and_form() {
        let at = datetime!(2026-03-01 12:00:00 UTC);
        let row: TokenRow = (
            "req-1".to_string(),
            true,
            at,
            r#"["openid","offline"]"#.to_string(),
            r#"["openid"]"#.to_string(),
            "[]".to_string(),
            "[]".to_string(),
            json!({"response_type": ["code"], "scope": ["openid", "offline"]}),
            "client-one".to_string(),
            "session-1".to_string(),
            at,
            at,
            None,
        );

        let record = record_from_row(row).unwrap();
        assert!(record.active);
        assert_eq!(record.requested_scope, vec!["openid", "offline"]);
        assert_eq!(record.granted_scope, vec!["openid"]);
        assert!(record.requested_audience.is_empty());
        assert_eq!(
            record.form.get("scope"),
            Some(&vec!["openid".to_string(), "offline".to_string()])
        );
        assert_eq!(record.session_id, "session-1");
    }

    #[test]
    fn test_record_from_row_rejects_corrupt_lists() {
        let at = datetime!(2026-03-01 12:00:00 UTC);
        let row: TokenRow = (
            "req-1".to_string(),
            true,
            at,
            "openid;offline".to_string(),
            "[]".to_string(),
            "[]".to_string(),
            "[]".to_string(),
            json!({}),
            "client-one".to_string(),
            "session-1".to_string(),
            at,
            at,
            None,
        );

        assert!(record_from_row(row).unwrap_err().is_serialization());
    }

    #[test]
    fn test_token_tables_use_distinct_lookup_columns() {
        assert_eq!(AUTHORIZE_CODES.lookup, "code");
        for t in [ACCESS_TOKENS, REFRESH_TOKENS, PKCE_REQUESTS] {
            assert_eq!(t.lookup, "signature");
        }
    }
}

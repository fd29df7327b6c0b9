//! Session row persistence.
//!
//! Sessions are only ever written as part of a token create, inside that
//! create's transaction. Reads rebuild the domain type and eagerly attach
//! the owning user row when one is set.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgTransaction;
use time::OffsetDateTime;

use ovl_auth::{RecordMeta, Session, StoreError, StoreResult};

use crate::{PostgresAuthStore, map_db_err};

type SessionRow = (
    String,                  // id
    String,                  // client_id
    Option<String>,          // user_id
    String,                  // username
    String,                  // subject
    serde_json::Value,       // expires_at
    serde_json::Value,       // extra
    OffsetDateTime,          // created_at
    OffsetDateTime,          // updated_at
    Option<OffsetDateTime>,  // deleted_at
);

/// Inserts or updates the session row inside the caller's transaction.
pub(crate) async fn upsert_session(
    tx: &mut PgTransaction<'_>,
    session: &Session,
) -> StoreResult<()> {
    let expires_at = serde_json::to_value(&session.expires_at)?;
    let extra = serde_json::Value::Object(session.extra.clone());

    query(
        r#"
        INSERT INTO sessions (id, client_id, user_id, username, subject, expires_at, extra,
                              created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
        ON CONFLICT (id) DO UPDATE SET
            client_id = EXCLUDED.client_id,
            user_id = EXCLUDED.user_id,
            username = EXCLUDED.username,
            subject = EXCLUDED.subject,
            expires_at = EXCLUDED.expires_at,
            extra = EXCLUDED.extra,
            updated_at = NOW()
        "#,
    )
    .bind(&session.id)
    .bind(&session.client_id)
    .bind(session.user_id.as_deref())
    .bind(&session.username)
    .bind(&session.subject)
    .bind(&expires_at)
    .bind(&extra)
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;

    Ok(())
}

impl PostgresAuthStore {
    /// Loads a session and eagerly attaches its user row.
    pub(crate) async fn load_session(&self, session_id: &str) -> StoreResult<Session> {
        let row: Option<SessionRow> = query_as(
            r#"
            SELECT id, client_id, user_id, username, subject, expires_at, extra,
                   created_at, updated_at, deleted_at
            FROM sessions
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        let Some((
            id,
            client_id,
            user_id,
            username,
            subject,
            expires_at,
            extra,
            created_at,
            updated_at,
            deleted_at,
        )) = row
        else {
            return Err(StoreError::not_found(format!("Session '{session_id}'")));
        };

        let expires_at = serde_json::from_value(expires_at)?;
        let extra = match extra {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let user = match user_id.as_deref() {
            Some(uid) => self.find_user(uid).await?,
            None => None,
        };

        Ok(Session {
            id,
            client_id,
            user_id,
            username,
            subject,
            expires_at,
            extra,
            meta: RecordMeta {
                created_at,
                updated_at,
                deleted_at,
            },
            user,
        })
    }
}

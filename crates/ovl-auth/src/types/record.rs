//! Shared persistence shapes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::client::Client;
use crate::types::request::{AuthRequest, RequestForm};
use crate::types::session::Session;

/// Audit timestamps carried by every stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Timestamp when the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Timestamp of the last mutation.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// Soft-delete marker; deleted records are invisible to reads.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub deleted_at: Option<OffsetDateTime>,
}

impl RecordMeta {
    /// Creates metadata stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Bumps the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Returns `true` if the record is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::now()
    }
}

/// Row shape shared by the four token tables.
///
/// `id` is the originating request id; the lookup key (authorization code or
/// token signature) lives in a table-specific column and is not part of this
/// shape. Rows start out active and are flipped inactive on invalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    pub requested_scope: Vec<String>,
    pub granted_scope: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    /// Submitted form parameters, multi-valued.
    pub form: RequestForm,
    pub client_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl TokenRecord {
    /// Snapshots a request into the shared row shape; new records are active.
    #[must_use]
    pub fn from_request(request: &AuthRequest) -> Self {
        Self {
            id: request.id.clone(),
            active: true,
            requested_at: request.requested_at,
            requested_scope: request.requested_scope.clone(),
            granted_scope: request.granted_scope.clone(),
            requested_audience: request.requested_audience.clone(),
            granted_audience: request.granted_audience.clone(),
            form: request.form.clone(),
            client_id: request.client.id.clone(),
            session_id: request.session.id.clone(),
            meta: RecordMeta::now(),
        }
    }

    /// Rebuilds the stored request from this record and its loaded client
    /// and session rows.
    #[must_use]
    pub fn into_request(self, client: Client, session: Session) -> AuthRequest {
        AuthRequest {
            id: self.id,
            requested_at: self.requested_at,
            client,
            requested_scope: self.requested_scope,
            granted_scope: self.granted_scope,
            requested_audience: self.requested_audience,
            granted_audience: self.granted_audience,
            form: self.form,
            session,
        }
    }
}

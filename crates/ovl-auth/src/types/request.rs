//! Stored OAuth2 request snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::client::Client;
use crate::types::session::Session;

/// Submitted form parameters; values are multi-valued.
pub type RequestForm = BTreeMap<String, Vec<String>>;

/// The OAuth2 request snapshot persisted with every token.
///
/// Cloning is a deep copy; handlers that mutate a request while processing
/// it work on their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Request identifier; all token rows minted for one grant share it.
    pub id: String,

    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,

    /// Full client registration at request time.
    pub client: Client,

    pub requested_scope: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub granted_scope: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_audience: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub granted_audience: Vec<String>,

    /// Raw form parameters from the authorize or token endpoint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form: RequestForm,

    pub session: Session,
}

impl AuthRequest {
    /// Creates a request with a generated id, stamped with the current time.
    #[must_use]
    pub fn new(client: Client, session: Session) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requested_at: OffsetDateTime::now_utc(),
            client,
            requested_scope: Vec::new(),
            granted_scope: Vec::new(),
            requested_audience: Vec::new(),
            granted_audience: Vec::new(),
            form: RequestForm::new(),
            session,
        }
    }

    /// Records a granted scope.
    pub fn grant_scope(&mut self, scope: impl Into<String>) {
        self.granted_scope.push(scope.into());
    }

    /// Records a granted audience.
    pub fn grant_audience(&mut self, audience: impl Into<String>) {
        self.granted_audience.push(audience.into());
    }

    /// Appends a form value, preserving existing values for the key.
    pub fn add_form_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.form.entry(key.into()).or_default().push(value.into());
    }
}

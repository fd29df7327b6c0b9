//! Resource-owner accounts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential;
use crate::error::{StoreError, StoreResult};
use crate::types::record::RecordMeta;

/// A resource-owner account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    /// Disabled accounts fail authentication.
    pub active: bool,

    /// Display name.
    pub name: String,

    /// Login name (natural key).
    pub username: String,

    /// Argon2 PHC hash of the password; plaintext is never stored.
    pub password_hash: String,

    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl User {
    /// Creates an active user with a generated id.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            active: true,
            name: name.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            meta: RecordMeta::now(),
        }
    }

    /// Validates invariants before an upsert.
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid("User id must not be empty"));
        }
        if self.username.is_empty() {
            return Err(StoreError::invalid("Username must not be empty"));
        }
        if self.password_hash.is_empty() {
            return Err(StoreError::invalid(format!(
                "User '{}' must have a password hash",
                self.username
            )));
        }
        Ok(())
    }

    /// Verifies a plaintext password against the stored hash.
    ///
    /// Malformed stored hashes verify as `false`.
    #[must_use]
    pub fn verify_password(&self, secret: &str) -> bool {
        credential::verify_password(secret, &self.password_hash).unwrap_or(false)
    }
}

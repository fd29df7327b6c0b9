//! OAuth2 client registrations.

use serde::{Deserialize, Serialize};

use crate::credential;
use crate::error::{StoreError, StoreResult};
use crate::types::record::RecordMeta;

/// A registered OAuth2 client.
///
/// Secrets are stored as Argon2 PHC hashes; `rotated_secrets` keeps the
/// hashes of previous secrets that are still accepted during rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Client identifier (natural key).
    pub id: String,

    /// Inactive clients are still readable but must not authenticate.
    pub active: bool,

    /// PHC hash of the current client secret. Empty for public clients.
    pub secret: String,

    /// PHC hashes of previously valid secrets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rotated_secrets: Vec<String>,

    /// Public clients authenticate without a secret.
    pub public: bool,

    pub redirect_uris: Vec<String>,

    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,

    pub grant_types: Vec<String>,

    pub response_types: Vec<String>,

    /// Token endpoint authentication method, e.g. `client_secret_basic`.
    pub token_endpoint_auth_method: String,

    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Client {
    /// Creates an active confidential client with the given id and hashed
    /// secret. Lists start empty; fill them before upserting.
    #[must_use]
    pub fn new(id: impl Into<String>, secret_hash: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: true,
            secret: secret_hash.into(),
            rotated_secrets: Vec::new(),
            public: false,
            redirect_uris: Vec::new(),
            scopes: Vec::new(),
            audience: Vec::new(),
            grant_types: Vec::new(),
            response_types: Vec::new(),
            token_endpoint_auth_method: "client_secret_basic".to_string(),
            meta: RecordMeta::now(),
        }
    }

    /// Validates invariants before an upsert.
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid("Client id must not be empty"));
        }
        if !self.public && self.secret.is_empty() {
            return Err(StoreError::invalid(format!(
                "Confidential client '{}' must have a secret",
                self.id
            )));
        }
        Ok(())
    }

    /// Returns `true` if the client authenticates without a secret.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Returns `true` if `uri` exactly matches a registered redirect URI.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Returns `true` if the client may use the given grant type.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Returns `true` if the client may use the given response type.
    #[must_use]
    pub fn is_response_type_allowed(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }

    /// Verifies a presented secret against the current hash, then against
    /// each rotated hash.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        if credential::verify_password(secret, &self.secret).unwrap_or(false) {
            return true;
        }
        self.rotated_secrets
            .iter()
            .any(|hash| credential::verify_password(secret, hash).unwrap_or(false))
    }
}

//! Sessions and per-token-kind expiries.
//!
//! A session carries the authenticated identity behind a grant. Every token
//! minted for one grant references the same session row; creating a token
//! upserts the session, so later tokens see the freshest identity state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::record::RecordMeta;
use crate::types::user::User;

/// Token classes a session tracks expiries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AuthorizeCode,
    AccessToken,
    RefreshToken,
    IdToken,
}

impl TokenKind {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizeCode => "authorize_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated state shared by every token minted for one grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,

    pub client_id: String,

    /// Owning user; machine-client sessions have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub username: String,

    /// Subject claim minted into tokens.
    #[serde(default)]
    pub subject: String,

    /// Expiry per token kind, unix seconds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expires_at: BTreeMap<TokenKind, i64>,

    /// Free-form extension claims.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,

    #[serde(flatten)]
    pub meta: RecordMeta,

    /// Owning user row, eagerly loaded on reads; never persisted inline.
    #[serde(skip)]
    pub user: Option<User>,
}

impl Session {
    /// Creates an anonymous session for the given client with a generated id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            user_id: None,
            username: String::new(),
            subject: String::new(),
            expires_at: BTreeMap::new(),
            extra: Map::new(),
            meta: RecordMeta::now(),
            user: None,
        }
    }

    /// Attaches the resource owner to the session.
    #[must_use]
    pub fn with_user(mut self, user: &User) -> Self {
        self.user_id = Some(user.id.clone());
        self.username = user.username.clone();
        self.subject = user.id.clone();
        self
    }

    /// Sets the expiry for one token kind, at second precision.
    pub fn set_expiry(&mut self, kind: TokenKind, expires_at: OffsetDateTime) {
        self.expires_at.insert(kind, expires_at.unix_timestamp());
    }

    /// Returns the expiry for one token kind, if set.
    #[must_use]
    pub fn expiry(&self, kind: TokenKind) -> Option<OffsetDateTime> {
        self.expires_at
            .get(&kind)
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(*ts).ok())
    }
}

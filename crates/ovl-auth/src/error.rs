//! Storage error taxonomy.
//!
//! Every backend maps its failures into [`StoreError`] so callers branch on
//! semantics rather than on driver details. Two variants carry the stored
//! request snapshot: a consumed authorization code and an inactive token are
//! protocol signals whose handlers still need the original grant (revocation
//! cascades, fraud detection).

use thiserror::Error;

use crate::types::AuthRequest;

/// Convenience alias for storage results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given key.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The authorization code exists but has already been consumed.
    #[error("Authorization code has already been used")]
    InvalidatedCode { request: Box<AuthRequest> },

    /// The token or PKCE record exists but is no longer active.
    #[error("Token is inactive")]
    InactiveToken { request: Box<AuthRequest> },

    /// The client assertion JTI was already accepted within its window.
    #[error("Client assertion jti '{jti}' has already been used")]
    ReplayDetected { jti: String },

    /// A record with the same unique key already exists.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The input was rejected before reaching the backend.
    #[error("Invalid input: {message}")]
    Invalid { message: String },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend is unreachable or failed mid-operation.
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an invalidated-code error carrying the stored request.
    #[must_use]
    pub fn invalidated_code(request: AuthRequest) -> Self {
        Self::InvalidatedCode {
            request: Box::new(request),
        }
    }

    /// Creates an inactive-token error carrying the stored request.
    #[must_use]
    pub fn inactive_token(request: AuthRequest) -> Self {
        Self::InactiveToken {
            request: Box::new(request),
        }
    }

    /// Creates a replay-detected error.
    #[must_use]
    pub fn replay_detected(jti: impl Into<String>) -> Self {
        Self::ReplayDetected { jti: jti.into() }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an invalid-input error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error is an invalidated-code error.
    #[must_use]
    pub const fn is_invalidated_code(&self) -> bool {
        matches!(self, Self::InvalidatedCode { .. })
    }

    /// Returns `true` if the error is an inactive-token error.
    #[must_use]
    pub const fn is_inactive_token(&self) -> bool {
        matches!(self, Self::InactiveToken { .. })
    }

    /// Returns `true` if the error is a replay-detected error.
    #[must_use]
    pub const fn is_replay_detected(&self) -> bool {
        matches!(self, Self::ReplayDetected { .. })
    }

    /// Returns `true` if the error is a conflict error.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if the error is an invalid-input error.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Returns `true` if the error is a serialization error.
    #[must_use]
    pub const fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }

    /// Returns `true` if the error is an unavailable error.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the stored request carried by invalidated-code and
    /// inactive-token errors.
    #[must_use]
    pub fn request(&self) -> Option<&AuthRequest> {
        match self {
            Self::InvalidatedCode { request } | Self::InactiveToken { request } => Some(&**request),
            _ => None,
        }
    }

    /// Consumes the error, returning the stored request if it carries one.
    #[must_use]
    pub fn into_request(self) -> Option<AuthRequest> {
        match self {
            Self::InvalidatedCode { request } | Self::InactiveToken { request } => Some(*request),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Token store contracts.
//!
//! Four token classes share one operation shape: create with an embedded
//! session, get by lookup key, invalidate by request id, delete by lookup
//! key. The lookup key is the authorization code for codes and the token
//! signature for the rest; the request id ties the rows of one grant
//! together across tables.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::types::AuthRequest;

use super::{ClientRegistry, JtiStore, UserStore};

/// Storage for one-time-use authorization codes.
#[async_trait]
pub trait AuthorizeCodeStore: Send + Sync {
    /// Stores the request under `code`, upserting the embedded session in
    /// the same atomic unit. A duplicate code fails with a conflict and
    /// leaves no orphan session behind.
    async fn create_authorize_code_session(
        &self,
        code: &str,
        request: &AuthRequest,
    ) -> StoreResult<()>;

    /// Loads the request stored under `code`, with client, session, and the
    /// session's user eagerly loaded.
    ///
    /// A consumed code fails with an invalidated-code error that still
    /// carries the stored snapshot.
    async fn get_authorize_code_session(&self, code: &str) -> StoreResult<AuthRequest>;

    /// Marks the code consumed, keyed by request id. Idempotent.
    async fn invalidate_authorize_code_session(&self, request_id: &str) -> StoreResult<()>;

    /// Hard-deletes the row stored under `code`.
    async fn delete_authorize_code_session(&self, code: &str) -> StoreResult<()>;
}

/// Storage for access tokens, keyed by signature.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// Stores the request under `signature`, upserting the embedded session
    /// in the same atomic unit.
    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()>;

    /// Loads the request stored under `signature`.
    ///
    /// A revoked token fails with an inactive-token error that still
    /// carries the stored snapshot.
    async fn get_access_token_session(&self, signature: &str) -> StoreResult<AuthRequest>;

    /// Deactivates the token, keyed by request id. Idempotent.
    async fn invalidate_access_token_session(&self, request_id: &str) -> StoreResult<()>;

    /// Hard-deletes the row stored under `signature`.
    async fn delete_access_token_session(&self, signature: &str) -> StoreResult<()>;
}

/// Storage for refresh tokens, keyed by signature.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Stores the request under `signature`, upserting the embedded session
    /// in the same atomic unit.
    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()>;

    /// Loads the request stored under `signature`.
    ///
    /// A revoked token fails with an inactive-token error that still
    /// carries the stored snapshot, letting the caller distinguish reuse of
    /// a rotated token from an unknown one.
    async fn get_refresh_token_session(&self, signature: &str) -> StoreResult<AuthRequest>;

    /// Deactivates the token, keyed by request id. Idempotent.
    async fn invalidate_refresh_token_session(&self, request_id: &str) -> StoreResult<()>;

    /// Hard-deletes the row stored under `signature`.
    async fn delete_refresh_token_session(&self, signature: &str) -> StoreResult<()>;
}

/// Storage for PKCE request records, keyed by signature.
///
/// PKCE records follow the authorization-code lifecycle; the protocol
/// engine deletes the verifier record after the code exchange.
#[async_trait]
pub trait PkceRequestStore: Send + Sync {
    /// Stores the request under `signature`, upserting the embedded session
    /// in the same atomic unit.
    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()>;

    /// Loads the request stored under `signature`.
    ///
    /// An invalidated record fails with an inactive-token error that still
    /// carries the stored snapshot.
    async fn get_pkce_request_session(&self, signature: &str) -> StoreResult<AuthRequest>;

    /// Deactivates the record, keyed by request id. Idempotent.
    async fn invalidate_pkce_request_session(&self, request_id: &str) -> StoreResult<()>;

    /// Hard-deletes the row stored under `signature`.
    async fn delete_pkce_request_session(&self, signature: &str) -> StoreResult<()>;
}

/// The full storage contract an authorization server needs.
///
/// Blanket-implemented for any type providing all component contracts, so a
/// backend only implements the pieces and gets the composite for free.
#[async_trait]
pub trait OAuth2Storage:
    ClientRegistry
    + UserStore
    + JtiStore
    + AuthorizeCodeStore
    + AccessTokenStore
    + RefreshTokenStore
    + PkceRequestStore
{
    /// Revokes every token minted for one request id.
    ///
    /// The access-token and refresh-token sessions are invalidated; a kind
    /// that was never minted is skipped. Fails with not-found only when
    /// neither kind existed.
    async fn revoke_request(&self, request_id: &str) -> StoreResult<()> {
        let mut revoked = false;

        match self.invalidate_access_token_session(request_id).await {
            Ok(()) => revoked = true,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.invalidate_refresh_token_session(request_id).await {
            Ok(()) => revoked = true,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if revoked {
            Ok(())
        } else {
            Err(StoreError::not_found(format!(
                "Tokens for request '{request_id}'"
            )))
        }
    }
}

#[async_trait]
impl<T> OAuth2Storage for T where
    T: ClientRegistry
        + UserStore
        + JtiStore
        + AuthorizeCodeStore
        + AccessTokenStore
        + RefreshTokenStore
        + PkceRequestStore
{
}

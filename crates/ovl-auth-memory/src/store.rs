//! Map-backed implementations of the storage contracts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use ovl_auth::storage::{
    AccessTokenStore, AuthorizeCodeStore, ClientRegistry, JtiStore, PkceRequestStore,
    RefreshTokenStore, UserStore,
};
use ovl_auth::{
    AuthRequest, Client, RecordMeta, Session, StoreError, StoreResult, TokenRecord, User,
};

/// Token tables, all sharing the [`TokenRecord`] row shape.
#[derive(Clone, Copy)]
enum TokenClass {
    AuthorizeCode,
    AccessToken,
    RefreshToken,
    PkceRequest,
}

impl TokenClass {
    /// Entity name used in error messages.
    const fn entity(self) -> &'static str {
        match self {
            Self::AuthorizeCode => "Authorization code",
            Self::AccessToken => "Access token",
            Self::RefreshToken => "Refresh token",
            Self::PkceRequest => "PKCE request",
        }
    }
}

#[derive(Default)]
struct Inner {
    clients: HashMap<String, Client>,
    users: HashMap<String, User>,
    /// Username -> user id.
    usernames: HashMap<String, String>,
    sessions: HashMap<String, Session>,
    authorize_codes: HashMap<String, TokenRecord>,
    access_tokens: HashMap<String, TokenRecord>,
    refresh_tokens: HashMap<String, TokenRecord>,
    pkce_requests: HashMap<String, TokenRecord>,
    /// JTI -> end of its validity window.
    jtis: HashMap<String, OffsetDateTime>,
}

impl Inner {
    fn table(&self, class: TokenClass) -> &HashMap<String, TokenRecord> {
        match class {
            TokenClass::AuthorizeCode => &self.authorize_codes,
            TokenClass::AccessToken => &self.access_tokens,
            TokenClass::RefreshToken => &self.refresh_tokens,
            TokenClass::PkceRequest => &self.pkce_requests,
        }
    }

    fn table_mut(&mut self, class: TokenClass) -> &mut HashMap<String, TokenRecord> {
        match class {
            TokenClass::AuthorizeCode => &mut self.authorize_codes,
            TokenClass::AccessToken => &mut self.access_tokens,
            TokenClass::RefreshToken => &mut self.refresh_tokens,
            TokenClass::PkceRequest => &mut self.pkce_requests,
        }
    }
}

/// Stores the embedded session, preserving `created_at` on updates. The
/// eagerly loaded user is never stored inline.
fn upsert_session(inner: &mut Inner, session: &Session) {
    let mut stored = session.clone();
    stored.user = None;
    match inner.sessions.get(&stored.id) {
        Some(existing) => {
            stored.meta.created_at = existing.meta.created_at;
            stored.meta.touch();
        }
        None => stored.meta = RecordMeta::now(),
    }
    inner.sessions.insert(stored.id.clone(), stored);
}

/// Rebuilds the stored request from a token row, attaching its session
/// (with user) and client.
fn hydrate(inner: &Inner, record: &TokenRecord) -> StoreResult<AuthRequest> {
    let mut session = inner
        .sessions
        .get(&record.session_id)
        .cloned()
        .ok_or_else(|| StoreError::not_found(format!("Session '{}'", record.session_id)))?;
    if let Some(user_id) = session.user_id.as_deref() {
        session.user = inner.users.get(user_id).cloned();
    }
    let client = inner
        .clients
        .get(&record.client_id)
        .cloned()
        .ok_or_else(|| StoreError::not_found(format!("Client '{}'", record.client_id)))?;
    Ok(record.clone().into_request(client, session))
}

/// Map-backed store implementing every storage contract.
///
/// Cloning is cheap; clones share state.
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryAuthStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_token(
        &self,
        class: TokenClass,
        lookup: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        let record = TokenRecord::from_request(request);
        let mut inner = self.inner.write().await;
        // Lookup key and request id are both unique per table, mirroring the
        // relational constraints; checked before the session upsert so a
        // losing duplicate create leaves the session untouched.
        let table = inner.table(class);
        if table.contains_key(lookup) || table.values().any(|r| r.id == record.id) {
            return Err(StoreError::conflict(format!(
                "{} already exists",
                class.entity()
            )));
        }
        upsert_session(&mut inner, &request.session);
        inner.table_mut(class).insert(lookup.to_string(), record);
        Ok(())
    }

    async fn get_token(&self, class: TokenClass, lookup: &str) -> StoreResult<(bool, AuthRequest)> {
        let inner = self.inner.read().await;
        let record = inner
            .table(class)
            .get(lookup)
            .ok_or_else(|| StoreError::not_found(class.entity()))?;
        let request = hydrate(&inner, record)?;
        Ok((record.active, request))
    }

    async fn invalidate_token(&self, class: TokenClass, request_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner
            .table_mut(class)
            .values_mut()
            .find(|r| r.id == request_id)
        else {
            return Err(StoreError::not_found(format!(
                "{} for request '{request_id}'",
                class.entity()
            )));
        };
        record.active = false;
        record.meta.touch();
        Ok(())
    }

    async fn delete_token(&self, class: TokenClass, lookup: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.table_mut(class).remove(lookup).is_none() {
            return Err(StoreError::not_found(class.entity()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientRegistry for MemoryAuthStore {
    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        let inner = self.inner.read().await;
        inner
            .clients
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("Client '{id}'")))
    }

    async fn upsert_client(&self, client: &Client) -> StoreResult<()> {
        client.validate()?;
        let mut inner = self.inner.write().await;
        let mut stored = client.clone();
        match inner.clients.get(&client.id) {
            Some(existing) => {
                stored.meta.created_at = existing.meta.created_at;
                stored.meta.touch();
            }
            None => stored.meta = RecordMeta::now(),
        }
        inner.clients.insert(stored.id.clone(), stored);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryAuthStore {
    async fn get_user(&self, id: &str) -> StoreResult<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("User '{id}'")))
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        user.validate()?;
        let mut inner = self.inner.write().await;
        let mut stored = user.clone();
        if let Some(existing_id) = inner.usernames.get(&user.username).cloned() {
            // The username keeps its original id across upserts.
            stored.id = existing_id.clone();
            if let Some(existing) = inner.users.get(&existing_id) {
                stored.meta.created_at = existing.meta.created_at;
            }
            stored.meta.touch();
            inner.users.insert(existing_id, stored);
        } else {
            if inner.users.contains_key(&user.id) {
                return Err(StoreError::conflict(format!(
                    "User id '{}' already exists",
                    user.id
                )));
            }
            stored.meta = RecordMeta::now();
            inner
                .usernames
                .insert(stored.username.clone(), stored.id.clone());
            inner.users.insert(stored.id.clone(), stored);
        }
        Ok(())
    }

    async fn authenticate(&self, username: &str, secret: &str) -> StoreResult<User> {
        let candidate = {
            let inner = self.inner.read().await;
            inner
                .usernames
                .get(username)
                .and_then(|id| inner.users.get(id))
                .cloned()
        };
        // The Argon2 check runs outside the lock.
        match candidate {
            Some(user) if user.active && user.verify_password(secret) => Ok(user),
            _ => Err(StoreError::not_found(format!("User '{username}'"))),
        }
    }
}

#[async_trait]
impl JtiStore for MemoryAuthStore {
    async fn verify_jti(&self, jti: &str) -> StoreResult<()> {
        let inner = self.inner.read().await;
        if let Some(expires_at) = inner.jtis.get(jti)
            && *expires_at > OffsetDateTime::now_utc()
        {
            return Err(StoreError::replay_detected(jti));
        }
        Ok(())
    }

    async fn check_and_record_jti(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.jtis.get(jti)
            && *existing > OffsetDateTime::now_utc()
        {
            return Err(StoreError::replay_detected(jti));
        }
        // Unknown or expired: arm the window.
        inner.jtis.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn cleanup_expired_jtis(&self) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        let before = inner.jtis.len();
        inner.jtis.retain(|_, expires_at| *expires_at > now);
        Ok((before - inner.jtis.len()) as u64)
    }
}

#[async_trait]
impl AuthorizeCodeStore for MemoryAuthStore {
    async fn create_authorize_code_session(
        &self,
        code: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(TokenClass::AuthorizeCode, code, request)
            .await
    }

    async fn get_authorize_code_session(&self, code: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(TokenClass::AuthorizeCode, code).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::invalidated_code(request))
        }
    }

    async fn invalidate_authorize_code_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(TokenClass::AuthorizeCode, request_id)
            .await
    }

    async fn delete_authorize_code_session(&self, code: &str) -> StoreResult<()> {
        self.delete_token(TokenClass::AuthorizeCode, code).await
    }
}

#[async_trait]
impl AccessTokenStore for MemoryAuthStore {
    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(TokenClass::AccessToken, signature, request)
            .await
    }

    async fn get_access_token_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(TokenClass::AccessToken, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    async fn invalidate_access_token_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(TokenClass::AccessToken, request_id)
            .await
    }

    async fn delete_access_token_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(TokenClass::AccessToken, signature).await
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryAuthStore {
    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(TokenClass::RefreshToken, signature, request)
            .await
    }

    async fn get_refresh_token_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(TokenClass::RefreshToken, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    async fn invalidate_refresh_token_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(TokenClass::RefreshToken, request_id)
            .await
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(TokenClass::RefreshToken, signature).await
    }
}

#[async_trait]
impl PkceRequestStore for MemoryAuthStore {
    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &AuthRequest,
    ) -> StoreResult<()> {
        self.create_token(TokenClass::PkceRequest, signature, request)
            .await
    }

    async fn get_pkce_request_session(&self, signature: &str) -> StoreResult<AuthRequest> {
        let (active, request) = self.get_token(TokenClass::PkceRequest, signature).await?;
        if active {
            Ok(request)
        } else {
            Err(StoreError::inactive_token(request))
        }
    }

    async fn invalidate_pkce_request_session(&self, request_id: &str) -> StoreResult<()> {
        self.invalidate_token(TokenClass::PkceRequest, request_id)
            .await
    }

    async fn delete_pkce_request_session(&self, signature: &str) -> StoreResult<()> {
        self.delete_token(TokenClass::PkceRequest, signature).await
    }
}

//! End-to-end coverage of the storage contracts against the in-memory
//! backend.

use std::sync::OnceLock;

use time::{Duration, OffsetDateTime};

use ovl_auth::storage::{
    AccessTokenStore, AuthorizeCodeStore, ClientRegistry, JtiStore, OAuth2Storage,
    PkceRequestStore, RefreshTokenStore, UserStore,
};
use ovl_auth::{AuthRequest, Client, Session, TokenKind, User, credential};
use ovl_auth_memory::MemoryAuthStore;

/// Hashing is slow under default Argon2 parameters; share one hash.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| credential::hash_password("12345678").unwrap())
}

fn demo_client() -> Client {
    let mut client = Client::new("client-one", password_hash());
    client.redirect_uris = vec!["http://localhost:3846/callback".to_string()];
    client.scopes = vec![
        "openid".to_string(),
        "offline".to_string(),
        "photos".to_string(),
    ];
    client.grant_types = vec![
        "authorization_code".to_string(),
        "refresh_token".to_string(),
    ];
    client.response_types = vec!["code".to_string()];
    client
}

fn demo_user() -> User {
    let mut user = User::new("ovl_doe", "Charles Doe", password_hash());
    user.id = "user-one".to_string();
    user
}

fn demo_request(client: &Client, user: &User) -> AuthRequest {
    let mut session = Session::new(client.id.clone()).with_user(user);
    session.set_expiry(
        TokenKind::AccessToken,
        OffsetDateTime::now_utc() + Duration::hours(1),
    );
    session.extra.insert(
        "acr".to_string(),
        serde_json::Value::String("urn:mfa".to_string()),
    );

    let mut request = AuthRequest::new(client.clone(), session);
    request.requested_scope = vec!["openid".to_string(), "offline".to_string()];
    request.grant_scope("openid");
    request.requested_audience = vec!["https://api.ovlplatform.dev".to_string()];
    request.grant_audience("https://api.ovlplatform.dev");
    request.add_form_value("scope", "openid");
    request.add_form_value("scope", "offline");
    request.add_form_value("response_type", "code");
    request
}

async fn seeded_store() -> (MemoryAuthStore, Client, User) {
    let store = MemoryAuthStore::new();
    let client = demo_client();
    let user = demo_user();
    store.upsert_client(&client).await.unwrap();
    store.upsert_user(&user).await.unwrap();
    (store, client, user)
}

#[tokio::test]
async fn test_authorize_code_round_trips_with_identity_attached() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);

    store
        .create_authorize_code_session("code-1", &request)
        .await
        .unwrap();
    let rebuilt = store.get_authorize_code_session("code-1").await.unwrap();

    assert_eq!(rebuilt.id, request.id);
    assert_eq!(rebuilt.requested_at, request.requested_at);
    assert_eq!(rebuilt.client.id, client.id);
    assert_eq!(rebuilt.client.redirect_uris, client.redirect_uris);
    assert_eq!(rebuilt.requested_scope, request.requested_scope);
    assert_eq!(rebuilt.granted_scope, request.granted_scope);
    assert_eq!(rebuilt.granted_audience, request.granted_audience);
    assert_eq!(rebuilt.form, request.form);

    let session = &rebuilt.session;
    assert_eq!(session.id, request.session.id);
    assert_eq!(session.subject, user.id);
    assert_eq!(session.username, "ovl_doe");
    assert_eq!(
        session.expiry(TokenKind::AccessToken),
        request.session.expiry(TokenKind::AccessToken)
    );
    assert_eq!(session.extra, request.session.extra);
    assert_eq!(
        session.user.as_ref().map(|u| u.id.as_str()),
        Some(user.id.as_str())
    );
}

#[tokio::test]
async fn test_consumed_codes_surface_the_stored_snapshot() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);
    store
        .create_authorize_code_session("code-1", &request)
        .await
        .unwrap();

    store
        .invalidate_authorize_code_session(&request.id)
        .await
        .unwrap();
    // Idempotent.
    store
        .invalidate_authorize_code_session(&request.id)
        .await
        .unwrap();

    let err = store
        .get_authorize_code_session("code-1")
        .await
        .unwrap_err();
    assert!(err.is_invalidated_code());
    let snapshot = err.into_request().unwrap();
    assert_eq!(snapshot.id, request.id);
    assert_eq!(snapshot.granted_scope, vec!["openid"]);

    store.delete_authorize_code_session("code-1").await.unwrap();
    assert!(
        store
            .get_authorize_code_session("code-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        store
            .delete_authorize_code_session("code-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_rotated_refresh_tokens_read_back_inactive_with_snapshot() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);

    store
        .create_refresh_token_session("rt-1", &request)
        .await
        .unwrap();
    store
        .invalidate_refresh_token_session(&request.id)
        .await
        .unwrap();

    let err = store.get_refresh_token_session("rt-1").await.unwrap_err();
    assert!(err.is_inactive_token());
    assert_eq!(
        err.request().map(|r| r.id.as_str()),
        Some(request.id.as_str())
    );
}

#[tokio::test]
async fn test_duplicate_lookup_keys_conflict_per_table() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);
    let second = demo_request(&client, &user);

    store
        .create_access_token_session("sig-1", &request)
        .await
        .unwrap();
    let err = store
        .create_access_token_session("sig-1", &second)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // The same key is free in other tables.
    store
        .create_refresh_token_session("sig-1", &second)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_request_ids_conflict_within_a_table() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);

    store
        .create_access_token_session("sig-1", &request)
        .await
        .unwrap();
    let err = store
        .create_access_token_session("sig-2", &request)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    // The losing create left no row behind.
    assert!(
        store
            .get_access_token_session("sig-2")
            .await
            .unwrap_err()
            .is_not_found()
    );

    // The same request id is still free in the other tables, so revocation
    // reaches every row of the grant.
    store
        .create_refresh_token_session("rt-1", &request)
        .await
        .unwrap();
    store.revoke_request(&request.id).await.unwrap();
    assert!(
        store
            .get_access_token_session("sig-1")
            .await
            .unwrap_err()
            .is_inactive_token()
    );
    assert!(
        store
            .get_refresh_token_session("rt-1")
            .await
            .unwrap_err()
            .is_inactive_token()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_creates_admit_exactly_one() {
    let (store, client, user) = seeded_store().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let request = demo_request(&client, &user);
        handles.push(tokio::spawn(async move {
            store
                .create_access_token_session("race-signature", &request)
                .await
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_later_creates_refresh_the_shared_session() {
    let (store, client, user) = seeded_store().await;
    let mut request = demo_request(&client, &user);

    store
        .create_authorize_code_session("code-1", &request)
        .await
        .unwrap();

    request.session.extra.insert(
        "amr".to_string(),
        serde_json::Value::String("pwd".to_string()),
    );
    request.session.set_expiry(
        TokenKind::RefreshToken,
        OffsetDateTime::now_utc() + Duration::days(30),
    );
    store
        .create_refresh_token_session("rt-1", &request)
        .await
        .unwrap();

    // The code now reads back the refreshed session state.
    let rebuilt = store.get_authorize_code_session("code-1").await.unwrap();
    assert_eq!(
        rebuilt.session.extra.get("amr"),
        Some(&serde_json::Value::String("pwd".to_string()))
    );
    assert!(rebuilt.session.expiry(TokenKind::RefreshToken).is_some());
}

#[tokio::test]
async fn test_revoke_request_invalidates_both_token_kinds() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);
    let other = demo_request(&client, &user);

    store
        .create_access_token_session("at-1", &request)
        .await
        .unwrap();
    store
        .create_refresh_token_session("rt-1", &request)
        .await
        .unwrap();
    store
        .create_access_token_session("at-2", &other)
        .await
        .unwrap();

    store.revoke_request(&request.id).await.unwrap();

    assert!(
        store
            .get_access_token_session("at-1")
            .await
            .unwrap_err()
            .is_inactive_token()
    );
    assert!(
        store
            .get_refresh_token_session("rt-1")
            .await
            .unwrap_err()
            .is_inactive_token()
    );
    // Other grants are untouched.
    store.get_access_token_session("at-2").await.unwrap();

    assert!(
        store
            .revoke_request("no-such-request")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_revoke_request_tolerates_a_missing_kind() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);
    store
        .create_refresh_token_session("rt-only", &request)
        .await
        .unwrap();

    store.revoke_request(&request.id).await.unwrap();
    assert!(
        store
            .get_refresh_token_session("rt-only")
            .await
            .unwrap_err()
            .is_inactive_token()
    );
}

#[tokio::test]
async fn test_pkce_records_follow_the_code_exchange() {
    let (store, client, user) = seeded_store().await;
    let request = demo_request(&client, &user);

    store
        .create_pkce_request_session("pkce-sig", &request)
        .await
        .unwrap();
    let rebuilt = store.get_pkce_request_session("pkce-sig").await.unwrap();
    assert_eq!(rebuilt.id, request.id);

    store.delete_pkce_request_session("pkce-sig").await.unwrap();
    assert!(
        store
            .get_pkce_request_session("pkce-sig")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_jti_replay_window_is_enforced_and_rearmed() {
    let store = MemoryAuthStore::new();
    let live = OffsetDateTime::now_utc() + Duration::minutes(5);
    let expired = OffsetDateTime::now_utc() - Duration::minutes(5);

    store.verify_jti("jti-1").await.unwrap();
    store.check_and_record_jti("jti-1", live).await.unwrap();

    assert!(
        store
            .verify_jti("jti-1")
            .await
            .unwrap_err()
            .is_replay_detected()
    );
    let err = store.check_and_record_jti("jti-1", live).await.unwrap_err();
    assert!(err.is_replay_detected());

    // A jti whose window has lapsed counts as new again.
    store.check_and_record_jti("jti-2", expired).await.unwrap();
    store.verify_jti("jti-2").await.unwrap();
    store.check_and_record_jti("jti-2", live).await.unwrap();
    assert!(
        store
            .verify_jti("jti-2")
            .await
            .unwrap_err()
            .is_replay_detected()
    );
}

#[tokio::test]
async fn test_cleanup_removes_only_expired_jtis() {
    let store = MemoryAuthStore::new();
    let now = OffsetDateTime::now_utc();
    store
        .check_and_record_jti("live-1", now + Duration::minutes(5))
        .await
        .unwrap();
    store
        .check_and_record_jti("gone-1", now - Duration::minutes(5))
        .await
        .unwrap();
    store
        .check_and_record_jti("gone-2", now - Duration::seconds(1))
        .await
        .unwrap();

    assert_eq!(store.cleanup_expired_jtis().await.unwrap(), 2);
    assert_eq!(store.cleanup_expired_jtis().await.unwrap(), 0);
    assert!(
        store
            .verify_jti("live-1")
            .await
            .unwrap_err()
            .is_replay_detected()
    );
}

#[tokio::test]
async fn test_authenticate_accepts_only_active_users_with_the_right_password() {
    let (store, _client, user) = seeded_store().await;

    let found = store.authenticate("ovl_doe", "12345678").await.unwrap();
    assert_eq!(found.id, user.id);

    assert!(
        store
            .authenticate("ovl_doe", "wrong")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        store
            .authenticate("nobody", "12345678")
            .await
            .unwrap_err()
            .is_not_found()
    );

    let mut disabled = user.clone();
    disabled.active = false;
    store.upsert_user(&disabled).await.unwrap();
    assert!(
        store
            .authenticate("ovl_doe", "12345678")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_upsert_user_keeps_the_id_for_an_existing_username() {
    let (store, _client, user) = seeded_store().await;

    let mut renamed = demo_user();
    renamed.id = "user-two".to_string();
    renamed.name = "Charlie Doe".to_string();
    store.upsert_user(&renamed).await.unwrap();

    let stored = store.get_user(&user.id).await.unwrap();
    assert_eq!(stored.name, "Charlie Doe");
    assert!(store.get_user("user-two").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_upsert_client_updates_in_place() {
    let (store, client, _user) = seeded_store().await;

    let mut updated = client.clone();
    updated.scopes.push("offline_access".to_string());
    store.upsert_client(&updated).await.unwrap();

    let stored = store.get_client(&client.id).await.unwrap();
    assert!(stored.scopes.contains(&"offline_access".to_string()));
    assert!(store.get_client("missing").await.unwrap_err().is_not_found());
}

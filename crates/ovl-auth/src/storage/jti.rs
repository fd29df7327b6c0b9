//! Replay guard for JWT-bearer client assertions.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StoreResult;

/// Tracks client assertion JTIs so each is accepted at most once per
/// validity window.
#[async_trait]
pub trait JtiStore: Send + Sync {
    /// Read-only check: succeeds if the jti is unknown or its window has
    /// expired, fails with replay-detected otherwise.
    async fn verify_jti(&self, jti: &str) -> StoreResult<()>;

    /// Atomically records a jti as used until `expires_at`.
    ///
    /// A known jti whose window has expired counts as new and is re-armed
    /// with the fresh expiry. A known live jti fails with replay-detected;
    /// under concurrent duplicates exactly one caller succeeds.
    async fn check_and_record_jti(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Deletes expired replay records, returning how many were removed.
    ///
    /// Idempotent; safe to run concurrently with checks.
    async fn cleanup_expired_jtis(&self) -> StoreResult<u64>;
}

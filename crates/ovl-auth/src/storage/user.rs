//! User store contract.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::User;

/// Lookup, provisioning, and password authentication of resource owners.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetches a user by id.
    async fn get_user(&self, id: &str) -> StoreResult<User>;

    /// Inserts or updates a user by the natural key `username`.
    ///
    /// An existing user keeps its id; only the mutable fields change.
    async fn upsert_user(&self, user: &User) -> StoreResult<()>;

    /// Verifies a username/password pair against the stored hash.
    ///
    /// Unknown usernames, disabled accounts, and wrong passwords all fail
    /// with the same not-found error so callers cannot enumerate accounts.
    async fn authenticate(&self, username: &str, secret: &str) -> StoreResult<User>;
}

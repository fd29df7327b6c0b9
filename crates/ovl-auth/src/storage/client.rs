//! Client registry contract.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::Client;

/// Lookup and provisioning of OAuth2 client registrations.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Fetches a client by id.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) for
    /// unknown ids; inactive clients are returned and left to the protocol
    /// layer to reject.
    async fn get_client(&self, id: &str) -> StoreResult<Client>;

    /// Inserts or updates a client by its natural key `id`.
    ///
    /// Idempotent; the seed path calls this on every start.
    async fn upsert_client(&self, client: &Client) -> StoreResult<()>;
}

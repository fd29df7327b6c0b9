//! In-memory backend for the OVL auth storage contracts.
//!
//! All state lives behind one `tokio::sync::RwLock`, so cross-table steps
//! such as session-upsert-plus-token-insert stay atomic. Intended for tests
//! and local development; deployments use `ovl-auth-postgres`.
//!
//! # Example
//!
//! ```ignore
//! use ovl_auth::Client;
//! use ovl_auth::storage::ClientRegistry;
//! use ovl_auth_memory::MemoryAuthStore;
//!
//! let store = MemoryAuthStore::new();
//! store.upsert_client(&Client::new("client-one", secret_hash)).await?;
//! let client = store.get_client("client-one").await?;
//! ```

mod store;

pub use store::MemoryAuthStore;

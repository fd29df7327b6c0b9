//! OAuth2 domain model and storage contracts for the OVL authorization server.
//!
//! This crate defines the persistence model shared by every storage backend:
//!
//! - [`types`]: clients, users, sessions, and stored OAuth2 request snapshots
//! - [`storage`]: async trait contracts implemented by backends
//! - [`codec`]: the string-list codec used for scope/audience TEXT columns
//! - [`credential`]: argon2 hashing for passwords and client secrets
//! - [`error`]: the storage error taxonomy
//!
//! Backends implementing the full [`storage::OAuth2Storage`] contract are
//! interchangeable: `ovl-auth-postgres` is the durable one, `ovl-auth-memory`
//! backs tests and local development.

pub mod codec;
pub mod credential;
pub mod error;
pub mod storage;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use types::{
    AuthRequest, Client, RecordMeta, RequestForm, Session, TokenKind, TokenRecord, User,
};

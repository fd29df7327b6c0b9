//! Storage trait contracts implemented by backends.
//!
//! The domain crate owns the contracts; backends implement them.
//! [`OAuth2Storage`] bundles the full set for consumers that want a single
//! handle to everything, and is blanket-implemented.

mod client;
mod jti;
mod token;
mod user;

pub use client::ClientRegistry;
pub use jti::JtiStore;
pub use token::{
    AccessTokenStore, AuthorizeCodeStore, OAuth2Storage, PkceRequestStore, RefreshTokenStore,
};
pub use user::UserStore;

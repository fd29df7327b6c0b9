//! Domain entities persisted by the storage backends.

mod client;
mod record;
mod request;
mod session;
mod user;

pub use client::Client;
pub use record::{RecordMeta, TokenRecord};
pub use request::{AuthRequest, RequestForm};
pub use session::{Session, TokenKind};
pub use user::User;

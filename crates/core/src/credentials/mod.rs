//! Per-requester chat credentials.
//!
//! A requester authorizes the app once through the OAuth redirect; the
//! resulting user token is stored keyed by requester id and used for every
//! chat call made on that requester's behalf.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteCredentialStore;
pub use store::{CredentialError, CredentialStore};
pub use types::{AccessToken, AuthorizedUser};

//! Chat platform integration.
//!
//! The pipeline only talks to the chat platform through [`ChatClient`]:
//! posting the echo and the status placeholder, editing the placeholder as
//! the job moves through its states, and replying to a command's response
//! URL. [`SlackClient`] is the production implementation.

mod error;
mod signature;
mod slack;
mod traits;
mod types;

pub use error::ChatError;
pub use signature::{
    sign, verify_signature, SignatureError, MAX_SIGNATURE_AGE_SECS, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
pub use slack::{authorize_url, SlackClient};
pub use traits::ChatClient;
pub use types::{MessageBlock, PostedMessage, TextFormat};

//! Durable, at-least-once job hand-off between intake and the worker.
//!
//! Payloads are opaque bytes; the job codec lives in [`crate::job`]. A
//! received message must be acknowledged or negatively acknowledged; an
//! unacknowledged or nacked message is delivered again.

mod error;
mod memory;
mod pubsub;
mod traits;

pub use error::QueueError;
pub use memory::InMemoryQueue;
pub use pubsub::PubSubQueue;
pub use traits::{JobQueue, ReceivedMessage};

//! Background worker: queue receive loop plus the serialized generation
//! dispatcher.
//!
//! The receive loop pulls messages, acknowledges each one once it decodes,
//! and forwards the job over a bounded hand-off channel. The dispatcher takes
//! one job at a time from that channel and does not look at the next one
//! until the generation call returns; finished artifacts go to a spawned
//! delivery task that the dispatcher never waits for.

mod dispatcher;
mod receiver;
mod runner;
mod types;

pub use dispatcher::{DeliveryHandle, GenerationDispatcher};
pub use receiver::{ReceiveLoop, ReceiveOutcome};
pub use runner::PipelineWorker;
pub use types::{DispatchItem, WorkerSettings, WorkerStatus};

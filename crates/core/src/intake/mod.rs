//! Intake: turns an authenticated slash command into a queued job.
//!
//! The caller has already verified the request signature. Intake resolves
//! the requester's credential, posts the status placeholder, and publishes
//! the job. A placeholder that cannot be posted aborts the request before
//! anything is queued; a publish that fails leaves the placeholder showing
//! the failure notice.

mod command;
mod service;

pub use command::{route_command, CommandKind, CommandRequest, COMMANDS};
pub use service::{IntakeError, IntakeOutcome, IntakeService, JobReceipt};

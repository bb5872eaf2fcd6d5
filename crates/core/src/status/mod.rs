//! Job lifecycle states and the status message that displays them.
//!
//! Every job owns exactly one chat message. Each stage of the pipeline moves
//! the job forward through [`StatusMessage`], which performs one remote edit
//! per transition and refuses to move backwards or out of a terminal state.

mod message;
mod render;
mod state;

pub use message::{EditOutcome, StatusError, StatusMessage};
pub use render::{render_delivered, render_progress, DeliveredImage, GENERIC_FAILURE_NOTICE};
pub use state::JobStatus;

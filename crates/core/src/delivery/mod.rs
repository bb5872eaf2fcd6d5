//! Delivery: store a job's artifacts and show them in its status message.
//!
//! One delivery runs per successfully generated job, concurrently with other
//! deliveries and with the next generation. Deliveries carry no ordering
//! guarantee relative to each other and nothing joins on them.

mod worker;

pub use worker::{DeliveryError, DeliveryReport, DeliveryWorker, UNKNOWN_REQUESTER_NAME};

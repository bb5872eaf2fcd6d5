//! Write-once object storage for generated images.
//!
//! Objects are addressed by key and publicly readable at
//! `https://<host>/<bucket>/<key>`.

mod error;
mod fs;
mod gcs;
mod traits;

pub use error::StorageError;
pub use fs::FsObjectStore;
pub use gcs::GcsObjectStore;
pub use traits::{public_url, ObjectStore, PNG_CONTENT_TYPE};

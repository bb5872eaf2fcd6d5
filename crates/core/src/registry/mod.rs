//! Process-wide client handles.
//!
//! Each external client (queue, object store, chat platform) is constructed
//! asynchronously at startup, exactly once, independently of request traffic.
//! Consumers `ready().await` a [`ReadyHandle`] and are suspended until the
//! client exists; a failed construction is reported once on the registry's
//! [`FatalSignal`] so the process can exit.

mod handle;

pub use handle::{
    ClientReadiness, ClientRegistry, FatalError, FatalSignal, ReadyHandle, RegistryError,
};

//! Network subsystem for UDP voice transport

pub mod endpoint;

pub use endpoint::{CallEndpoint, RecvOutcome};

//! Receiver URL lookup through the collector management API.
//!
//! The host name doubles as the collector name, the source name, and the
//! source category, so every host gets exactly one endpoint.

pub mod client;
pub mod types;

pub use client::{ProvisionClient, ProvisionError};
pub use types::{Collector, Source};

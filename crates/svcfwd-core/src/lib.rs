//! svcfwd-core: Shared library for local forwarding of cluster services.
//!
//! This crate provides:
//! - Address range parsing and collision-safe allocation
//! - Workload resolution (service -> backing workload ports)
//! - Session orchestration with exactly-once resource teardown
//! - Collaborator traits for the cluster client, tunnel transport,
//!   hosts registry, liveness prober, and interface control
//! - Logging setup

pub mod alloc;
pub mod cluster;
pub mod constants;
pub mod error;
pub mod hosts;
pub mod iface;
pub mod logging;
pub mod orchestrate;
pub mod range;
pub mod resolve;
pub mod tunnel;

pub use error::{Error, Result};
pub use logging::{LogFormat, init_logging};

//! Tunnel transport collaborator.
//!
//! The transport owns the bytes on the wire; the core only cares about
//! start/stop semantics. `open_tunnel` blocks the session's execution context
//! until the tunnel ends for any reason.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::resolve::ForwardTarget;
use crate::Result;

/// Opens a bidirectional relay between a local address/port and the target
/// workload's port.
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    /// Run the tunnel until it ends: graceful stop, remote close, or
    /// transport error. The returned error is the session's termination
    /// cause.
    async fn open_tunnel(
        &self,
        target: &ForwardTarget,
        local_addr: Ipv4Addr,
        local_port: u16,
    ) -> Result<()>;
}

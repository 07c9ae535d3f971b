//! Interface-control collaborator.
//!
//! Adds and removes address aliases on a named local interface. The
//! orchestrator serializes every list+mutate sequence behind one lock, so
//! implementations do not need their own synchronization.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::Result;

/// Controls address aliases on a local network interface.
#[async_trait]
pub trait InterfaceControl: Send + Sync {
    /// Add `addr` as an alias on `iface` (`ip addr add` semantics).
    async fn add_alias(&self, addr: Ipv4Addr, iface: &str) -> Result<()>;

    /// Remove the `addr` alias from `iface` (`ip addr del` semantics).
    async fn remove_alias(&self, addr: Ipv4Addr, iface: &str) -> Result<()>;

    /// List the addresses currently aliased on `iface`.
    async fn list_aliases(&self, iface: &str) -> Result<Vec<Ipv4Addr>>;
}

//! svcfwd binary support library.
//!
//! System implementations of the svcfwd-core collaborator traits, plus the
//! CLI surface:
//! - `kube`: cluster client over the Kubernetes API
//! - `transport`: tunnel transport over pod port-forwarding
//! - `probe`: liveness prober over the system `ping`
//! - `iface`: interface control over `ip addr`
//! - `hosts`: `/etc/hosts` editor

pub mod cli;
pub mod hosts;
pub mod iface;
pub mod kube;
pub mod probe;
pub mod transport;

pub use cli::Cli;

//! Interface control via the `ip` command.
//!
//! Mirrors `ip addr add/del/show` semantics. The orchestrator serializes
//! list+mutate sequences, so this implementation stays stateless.

use std::net::Ipv4Addr;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use svcfwd_core::iface::InterfaceControl;
use svcfwd_core::{Error, Result};

/// `ip addr` backed interface control.
pub struct IpCommand;

impl IpCommand {
    async fn run(args: &[&str]) -> Result<Output> {
        let output = Command::new("ip").args(args).output().await?;
        if !output.status.success() {
            return Err(Error::Binding {
                message: format!(
                    "ip {} failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl InterfaceControl for IpCommand {
    async fn add_alias(&self, addr: Ipv4Addr, iface: &str) -> Result<()> {
        Self::run(&["addr", "add", &addr.to_string(), "dev", iface]).await?;
        Ok(())
    }

    async fn remove_alias(&self, addr: Ipv4Addr, iface: &str) -> Result<()> {
        Self::run(&["addr", "del", &addr.to_string(), "dev", iface]).await?;
        Ok(())
    }

    async fn list_aliases(&self, iface: &str) -> Result<Vec<Ipv4Addr>> {
        let output = Self::run(&["addr", "show", iface]).await?;
        Ok(parse_inet_addrs(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extract IPv4 addresses from `ip addr show` output (`inet a.b.c.d/p ...`).
fn parse_inet_addrs(output: &str) -> Vec<Ipv4Addr> {
    output
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("inet "))
        .filter_map(|rest| rest.split(['/', ' ']).next())
        .filter_map(|addr| addr.parse().ok())
        .collect()
}

//! Liveness probing via the system `ping`.
//!
//! The allocator only needs a reply count; anything that goes wrong while
//! probing (missing binary, bad exit, unparseable output) counts as zero
//! replies, which the allocator treats as "address free".

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use svcfwd_core::alloc::Prober;

/// Prober that shells out to `ping`.
pub struct PingProber;

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, addr: Ipv4Addr, count: u32, timeout: Duration) -> usize {
        let wait_secs = timeout.as_secs().max(1);
        let output = Command::new("ping")
            .arg("-n")
            .arg("-c")
            .arg(count.to_string())
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(addr.to_string())
            .output()
            .await;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                parse_received(&stdout).unwrap_or(0)
            }
            Err(e) => {
                debug!(addr = %addr, error = %e, "ping failed to run, treating address as free");
                0
            }
        }
    }
}

/// Pull the reply count out of ping's summary line:
/// `3 packets transmitted, 2 received, 33% packet loss, time 2003ms`
fn parse_received(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .find(|line| line.contains("packets transmitted"))?
        .split(',')
        .nth(1)?
        .trim()
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

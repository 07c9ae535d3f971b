//! Collision-safe local address allocation.
//!
//! The allocator hands out addresses from a configured range while avoiding
//! both addresses already claimed by this process and addresses already live
//! on the network. Candidates are claimed before probing so a second
//! concurrent caller can never select the same candidate while a probe is in
//! flight, and a provably-live foreign address is never tried again within
//! the same run.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::{PROBE_COUNT, PROBE_TIMEOUT};
use crate::range::AddrRange;
use crate::{Error, Result};


/// Network liveness prober.
///
/// Sends `count` echo requests to `addr` and reports how many were answered
/// within `timeout` per reply. Best-effort: transport errors are reported as
/// zero replies, never surfaced to the caller.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr, count: u32, timeout: Duration) -> usize;
}

/// Process-lifetime address allocator.
///
/// Owns its allocation table; pass it by `Arc` to every session. Entries are
/// added on claim and never removed, so an address is not recycled within one
/// run even after its session tears down.
pub struct IpAllocator {
    claimed: Mutex<HashSet<Ipv4Addr>>,
    prober: Arc<dyn Prober>,
}

impl IpAllocator {
    /// Create an allocator with an empty table.
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            claimed: Mutex::new(HashSet::new()),
            prober,
        }
    }

    /// Allocate a free, non-live address from `range`.
    ///
    /// Candidates are visited in the range's defined order. A candidate that
    /// answers all probes is treated as in use on the network and skipped,
    /// with its claim kept. Fails with [`Error::RangeExhausted`] once every
    /// candidate has been claimed.
    pub async fn allocate(&self, range: &AddrRange) -> Result<Ipv4Addr> {
        for candidate in range.iter() {
            // Critical section covers only the claim bookkeeping. The probe
            // runs outside the lock so probes for distinct candidates may
            // proceed concurrently across callers.
            let newly_claimed = {
                let mut claimed = self.claimed.lock().await;
                claimed.insert(candidate)
            };
            if !newly_claimed {
                continue;
            }

            let replies = self.prober.probe(candidate, PROBE_COUNT, PROBE_TIMEOUT).await;
            if replies >= PROBE_COUNT as usize {
                debug!(addr = %candidate, replies, "address is live on the network, skipping");
                continue;
            }

            debug!(addr = %candidate, replies, "allocated local address");
            return Ok(candidate);
        }

        Err(Error::RangeExhausted {
            range: range.to_string(),
        })
    }

    /// Number of addresses claimed so far (allocated or burned on live hosts).
    pub async fn claimed_count(&self) -> usize {
        self.claimed.lock().await.len()
    }
}

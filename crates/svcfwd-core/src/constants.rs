//! Configuration constants for svcfwd.

use std::time::Duration;

// =============================================================================
// Allocation Constants
// =============================================================================

/// Default local address allocation range.
pub const DEFAULT_NETWORK_RANGE: &str = "127.1.27.1-254";

/// Number of echo requests sent per liveness probe.
pub const PROBE_COUNT: u32 = 3;

/// Per-reply wait for a liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Interface Constants
// =============================================================================

/// Default local network interface for address aliases.
pub const DEFAULT_INTERFACE: &str = "lo";

// =============================================================================
// Hostname Constants
// =============================================================================

/// Cluster domain suffix used for fully qualified service hostnames.
pub const CLUSTER_DOMAIN: &str = "svc.cluster.local";

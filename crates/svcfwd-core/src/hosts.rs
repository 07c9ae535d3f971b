//! Host-table collaborator and hostname derivation.
//!
//! The orchestrator registers aliases when a session enters tunneling and
//! removes them on release; `save` persists the table exactly once, after
//! every session has stopped.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::constants::CLUSTER_DOMAIN;
use crate::resolve::ForwardTarget;
use crate::Result;

/// External hostname-to-address table (typically `/etc/hosts`).
#[async_trait]
pub trait HostsRegistry: Send + Sync {
    /// Map `hostname` to `addr`.
    async fn add_alias(&self, hostname: &str, addr: Ipv4Addr) -> Result<()>;

    /// Drop the mapping for `hostname`.
    async fn remove_alias(&self, hostname: &str) -> Result<()>;

    /// Persist the table to durable storage.
    async fn save(&self) -> Result<()>;
}

/// Derive the hostname aliases a session registers for its target.
///
/// The first context/namespace pair gets the unqualified short name and the
/// `svc.namespace` form on top of the fully qualified one. Targets from a
/// non-primary context are qualified by context instead of the cluster
/// domain, so identical services on different clusters never collide.
pub fn host_aliases(target: &ForwardTarget) -> Vec<String> {
    let svc = &target.service_name;
    let ns = &target.namespace;

    if target.remote {
        return vec![format!("{svc}.{ns}.svc.cluster.{}", target.context)];
    }

    let mut aliases = Vec::new();
    if target.short_name {
        aliases.push(svc.clone());
        aliases.push(format!("{svc}.{ns}"));
    }
    aliases.push(format!("{svc}.{ns}.{CLUSTER_DOMAIN}"));
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(short_name: bool, remote: bool) -> ForwardTarget {
        ForwardTarget {
            context: "prod-cluster".into(),
            namespace: "the-project".into(),
            service_name: "api".into(),
            workload_name: "api-0".into(),
            workload_namespace: "the-project".into(),
            container_port: "8080".into(),
            service_port: 80,
            short_name,
            remote,
        }
    }

    #[test]
    fn short_name_targets_get_unqualified_aliases() {
        assert_eq!(
            host_aliases(&target(true, false)),
            vec![
                "api".to_string(),
                "api.the-project".to_string(),
                "api.the-project.svc.cluster.local".to_string(),
            ]
        );
    }

    #[test]
    fn later_targets_are_qualified() {
        assert_eq!(
            host_aliases(&target(false, false)),
            vec!["api.the-project.svc.cluster.local".to_string()]
        );
    }

    #[test]
    fn remote_targets_are_qualified_by_context() {
        assert_eq!(
            host_aliases(&target(false, true)),
            vec!["api.the-project.svc.cluster.prod-cluster".to_string()]
        );
    }
}

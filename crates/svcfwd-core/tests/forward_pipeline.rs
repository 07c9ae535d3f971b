//! End-to-end pipeline test: resolve services against a fake cluster, run the
//! orchestrator over the resolved targets with fake collaborators, and check
//! that every session's resources are claimed and reclaimed coherently.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use svcfwd_core::alloc::{IpAllocator, Prober};
use svcfwd_core::cluster::{
    ClusterClient, ContainerInfo, ContainerPort, PortTarget, ServiceInfo, ServicePort,
    WorkloadInfo,
};
use svcfwd_core::hosts::HostsRegistry;
use svcfwd_core::iface::InterfaceControl;
use svcfwd_core::orchestrate::{Collaborators, Orchestrator, OrchestratorConfig};
use svcfwd_core::range::AddrRange;
use svcfwd_core::resolve::{ForwardTarget, ResolveContext, Resolver};
use svcfwd_core::tunnel::TunnelTransport;
use svcfwd_core::Result;

struct QuietProber;

#[async_trait]
impl Prober for QuietProber {
    async fn probe(&self, _addr: Ipv4Addr, _count: u32, _timeout: Duration) -> usize {
        0
    }
}

struct TwoServiceCluster;

#[async_trait]
impl ClusterClient for TwoServiceCluster {
    async fn list_services(
        &self,
        namespace: &str,
        _selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>> {
        let selector: BTreeMap<String, String> =
            [("app".to_string(), "demo".to_string())].into();
        Ok(vec![
            ServiceInfo {
                name: "api".into(),
                namespace: namespace.into(),
                selector: selector.clone(),
                ports: vec![ServicePort {
                    name: Some("http".into()),
                    port: 80,
                    target: PortTarget::Name("http".into()),
                }],
            },
            ServiceInfo {
                name: "db".into(),
                namespace: namespace.into(),
                selector,
                ports: vec![ServicePort {
                    name: None,
                    port: 5432,
                    target: PortTarget::Number(5432),
                }],
            },
        ])
    }

    async fn list_workloads(&self, namespace: &str, _selector: &str) -> Result<Vec<WorkloadInfo>> {
        Ok(vec![WorkloadInfo {
            name: "demo-0".into(),
            namespace: namespace.into(),
            containers: vec![ContainerInfo {
                name: "main".into(),
                ports: vec![ContainerPort {
                    name: Some("http".into()),
                    port: 8080,
                }],
            }],
        }])
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo> {
        Ok(WorkloadInfo {
            name: name.into(),
            namespace: namespace.into(),
            containers: Vec::new(),
        })
    }
}

#[derive(Default)]
struct MemoryHosts {
    live: Mutex<BTreeMap<String, Ipv4Addr>>,
    added: Mutex<Vec<String>>,
    saves: Mutex<usize>,
}

#[async_trait]
impl HostsRegistry for MemoryHosts {
    async fn add_alias(&self, hostname: &str, addr: Ipv4Addr) -> Result<()> {
        self.live.lock().await.insert(hostname.to_string(), addr);
        self.added.lock().await.push(hostname.to_string());
        Ok(())
    }

    async fn remove_alias(&self, hostname: &str) -> Result<()> {
        self.live.lock().await.remove(hostname);
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        *self.saves.lock().await += 1;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryIface {
    bound: Mutex<HashSet<Ipv4Addr>>,
}

#[async_trait]
impl InterfaceControl for MemoryIface {
    async fn add_alias(&self, addr: Ipv4Addr, _iface: &str) -> Result<()> {
        self.bound.lock().await.insert(addr);
        Ok(())
    }

    async fn remove_alias(&self, addr: Ipv4Addr, _iface: &str) -> Result<()> {
        self.bound.lock().await.remove(&addr);
        Ok(())
    }

    async fn list_aliases(&self, _iface: &str) -> Result<Vec<Ipv4Addr>> {
        Ok(self.bound.lock().await.iter().copied().collect())
    }
}

/// Transport that records where each target was bound.
#[derive(Default)]
struct RecordingTransport {
    bindings: Mutex<Vec<(String, Ipv4Addr, u16, String)>>,
}

#[async_trait]
impl TunnelTransport for RecordingTransport {
    async fn open_tunnel(
        &self,
        target: &ForwardTarget,
        local_addr: Ipv4Addr,
        local_port: u16,
    ) -> Result<()> {
        self.bindings.lock().await.push((
            target.service_name.clone(),
            local_addr,
            local_port,
            target.container_port.clone(),
        ));
        Ok(())
    }
}

#[tokio::test]
async fn resolved_services_are_forwarded_and_cleaned_up() {
    let resolver = Resolver::new(Arc::new(TwoServiceCluster));
    let targets = resolver
        .resolve(&ResolveContext {
            context: "primary".into(),
            namespace: "the-project".into(),
            selector: None,
            short_name: true,
            remote: false,
        })
        .await
        .unwrap();
    assert_eq!(targets.len(), 2);

    let hosts = Arc::new(MemoryHosts::default());
    let iface = Arc::new(MemoryIface::default());
    let transport = Arc::new(RecordingTransport::default());

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            interface: "lo".into(),
            range: AddrRange::parse("127.1.27.1-4").unwrap(),
            exit_on_fail: false,
        },
        Collaborators {
            allocator: Arc::new(IpAllocator::new(Arc::new(QuietProber))),
            transport: transport.clone(),
            hosts: hosts.clone(),
            iface: iface.clone(),
        },
    );

    let report = orchestrator.run(targets).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    // Both tunnels ran, on distinct addresses from the range, with the
    // service port as local port and the resolved container port.
    let bindings = transport.bindings.lock().await.clone();
    assert_eq!(bindings.len(), 2);
    let addrs: HashSet<Ipv4Addr> = bindings.iter().map(|b| b.1).collect();
    assert_eq!(addrs.len(), 2);

    let api = bindings.iter().find(|b| b.0 == "api").unwrap();
    assert_eq!(api.2, 80);
    assert_eq!(api.3, "8080");
    let db = bindings.iter().find(|b| b.0 == "db").unwrap();
    assert_eq!(db.2, 5432);
    assert_eq!(db.3, "5432");

    // Short-name aliases were registered for the first context/namespace.
    let added = hosts.added.lock().await.clone();
    assert!(added.contains(&"api".to_string()));
    assert!(added.contains(&"api.the-project".to_string()));
    assert!(added.contains(&"api.the-project.svc.cluster.local".to_string()));

    // Everything was reclaimed, and the table was saved exactly once.
    assert!(hosts.live.lock().await.is_empty());
    assert!(iface.bound.lock().await.is_empty());
    assert_eq!(*hosts.saves.lock().await, 1);
}

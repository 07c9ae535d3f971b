//! Cluster control-plane collaborator.
//!
//! The control-plane client is external to the core: this module defines the
//! plain data model the resolver consumes and the trait a backend (kube, or a
//! mock in tests) implements. All access is read-only; errors propagate as
//! resolution failures.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::Result;

/// A logical service: a stable name plus a port set addressed via a selector.
#[derive(Debug, Clone, Default)]
pub struct ServiceInfo {
    pub name: String,
    pub namespace: String,
    /// Label selector resolving to zero or more backing workloads. Ordered so
    /// the derived query text is deterministic.
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
}

/// One declared port of a logical service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub name: Option<String>,
    /// Port the service exposes; also used as the local listen port.
    pub port: u16,
    /// Declared target on the backing workload.
    pub target: PortTarget,
}

/// A service port's declared target: a concrete number or a named container
/// port to be looked up on the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortTarget {
    Number(u16),
    Name(String),
}

/// A runnable instance backing a logical service.
#[derive(Debug, Clone, Default)]
pub struct WorkloadInfo {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerInfo>,
}

/// A container within a workload, with its declared ports.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    pub name: String,
    pub ports: Vec<ContainerPort>,
}

/// A declared container port, optionally named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPort {
    pub name: Option<String>,
    pub port: u16,
}

/// Read-only view of the cluster control plane.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List services in a namespace, optionally filtered by a label selector.
    async fn list_services(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>>;

    /// List workloads in a namespace matching a label selector.
    async fn list_workloads(&self, namespace: &str, selector: &str) -> Result<Vec<WorkloadInfo>>;

    /// Fetch a single workload by name.
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo>;
}

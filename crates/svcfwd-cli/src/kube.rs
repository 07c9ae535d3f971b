//! Cluster client over the Kubernetes API.
//!
//! Production implementation of the core `ClusterClient` trait, one client
//! per kubeconfig context, plus kubeconfig helpers for context and namespace
//! defaulting.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use svcfwd_core::cluster::{
    ClusterClient, ContainerInfo, ContainerPort, PortTarget, ServiceInfo, ServicePort,
    WorkloadInfo,
};
use svcfwd_core::{Error, Result};

/// Load the kubeconfig from an explicit path or the default locations.
pub fn load_kubeconfig(path: Option<&Path>) -> Result<Kubeconfig> {
    let result = match path {
        Some(path) => Kubeconfig::read_from(path),
        None => Kubeconfig::read(),
    };
    result.map_err(|e| Error::Config {
        message: format!("cannot read kubeconfig: {e}"),
    })
}

/// The namespace a context declares, if any.
pub fn context_namespace(kubeconfig: &Kubeconfig, context: &str) -> Option<String> {
    kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context)
        .and_then(|c| c.context.as_ref())
        .and_then(|c| c.namespace.clone())
}

/// Kubernetes-backed cluster client for one context.
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Build a client for `context` from an already-loaded kubeconfig.
    pub async fn from_kubeconfig(kubeconfig: Kubeconfig, context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| Error::Config {
                message: format!("cannot build REST config for context {context}: {e}"),
            })?;
        let client = Client::try_from(config).map_err(|e| Error::Config {
            message: format!("cannot build client for context {context}: {e}"),
        })?;
        Ok(Self { client })
    }

    /// The underlying kube client, for the port-forward transport.
    pub fn client(&self) -> Client {
        self.client.clone()
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn list_services(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let mut params = ListParams::default();
        if let Some(selector) = selector {
            params = params.labels(selector);
        }
        let list = api.list(&params).await.map_err(|e| Error::Resolution {
            message: format!("listing services in {namespace}: {e}"),
        })?;
        Ok(list.items.into_iter().map(service_info).collect())
    }

    async fn list_workloads(&self, namespace: &str, selector: &str) -> Result<Vec<WorkloadInfo>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(selector);
        let list = api.list(&params).await.map_err(|e| Error::Resolution {
            message: format!("listing pods for {selector} in {namespace}: {e}"),
        })?;
        Ok(list.items.into_iter().map(workload_info).collect())
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<WorkloadInfo> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = api.get(name).await.map_err(|e| Error::Resolution {
            message: format!("getting pod {namespace}/{name}: {e}"),
        })?;
        Ok(workload_info(pod))
    }
}

fn service_info(svc: Service) -> ServiceInfo {
    let name = svc.metadata.name.unwrap_or_default();
    let namespace = svc.metadata.namespace.unwrap_or_default();
    let spec = svc.spec.unwrap_or_default();

    let ports = spec
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| {
            let port = clamp_port(p.port);
            ServicePort {
                name: p.name,
                port,
                target: match p.target_port {
                    Some(IntOrString::Int(n)) => PortTarget::Number(clamp_port(n)),
                    Some(IntOrString::String(s)) => PortTarget::Name(s),
                    // No declared target means the service port itself.
                    None => PortTarget::Number(port),
                },
            }
        })
        .collect();

    ServiceInfo {
        name,
        namespace,
        selector: spec.selector.unwrap_or_default(),
        ports,
    }
}

fn workload_info(pod: Pod) -> WorkloadInfo {
    let name = pod.metadata.name.unwrap_or_default();
    let namespace = pod.metadata.namespace.unwrap_or_default();
    let containers = pod
        .spec
        .map(|spec| {
            spec.containers
                .into_iter()
                .map(|c| ContainerInfo {
                    name: c.name,
                    ports: c
                        .ports
                        .unwrap_or_default()
                        .into_iter()
                        .map(|p| ContainerPort {
                            name: p.name,
                            port: clamp_port(p.container_port),
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    WorkloadInfo {
        name,
        namespace,
        containers,
    }
}

fn clamp_port(port: i32) -> u16 {
    u16::try_from(port).unwrap_or(0)
}

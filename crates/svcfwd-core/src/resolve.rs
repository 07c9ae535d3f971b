//! Workload resolution: logical services to concrete forwarding targets.
//!
//! For each service matching the selector, the resolver derives a label query
//! from the service's own selector, picks the first backing workload, resolves
//! named target ports against the workload's container port declarations, and
//! emits one [`ForwardTarget`] per service port. Failures are scoped to the
//! affected service or port; resolution of the rest continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cluster::{ClusterClient, PortTarget, WorkloadInfo};
use crate::Result;

/// One resolved (service, workload, port) tuple, consumed by exactly one
/// forwarding session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    pub context: String,
    pub namespace: String,
    pub service_name: String,
    pub workload_name: String,
    pub workload_namespace: String,
    /// Target port on the workload. Stays a string because a named port that
    /// cannot be resolved passes through unresolved (best-effort).
    pub container_port: String,
    /// Service port; doubles as the local listen port.
    pub service_port: u16,
    /// First context and namespace processed: eligible for an unqualified
    /// hostname alias.
    pub short_name: bool,
    /// Non-primary context: aliases are qualified by context.
    pub remote: bool,
}

/// Where and what to resolve.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub context: String,
    pub namespace: String,
    /// Label selector filtering which services are forwarded.
    pub selector: Option<String>,
    pub short_name: bool,
    pub remote: bool,
}

/// Resolves logical services to forwarding targets through a cluster client.
pub struct Resolver {
    client: Arc<dyn ClusterClient>,
}

impl Resolver {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Resolve every matching service in the context's namespace.
    ///
    /// A failing service (no selector, no backing workloads, listing error)
    /// is logged and skipped; only a failure to list the services themselves
    /// aborts the pass.
    pub async fn resolve(&self, ctx: &ResolveContext) -> Result<Vec<ForwardTarget>> {
        let services = self
            .client
            .list_services(&ctx.namespace, ctx.selector.as_deref())
            .await?;

        let mut targets = Vec::new();

        for svc in services {
            let selector = selector_text(&svc.selector);
            if selector.is_empty() {
                warn!(
                    service = %svc.name,
                    namespace = %svc.namespace,
                    "service has no backing selector, skipping"
                );
                continue;
            }

            let workloads = match self.client.list_workloads(&svc.namespace, &selector).await {
                Ok(workloads) => workloads,
                Err(e) => {
                    warn!(
                        service = %svc.name,
                        selector = %selector,
                        error = %e,
                        "listing workloads failed, skipping service"
                    );
                    continue;
                }
            };

            let Some(workload) = workloads.into_iter().next() else {
                warn!(
                    service = %svc.name,
                    namespace = %svc.namespace,
                    selector = %selector,
                    "no workloads match selector, skipping service"
                );
                continue;
            };

            for port in &svc.ports {
                // The workload may have vanished between listing and use.
                if let Err(e) = self
                    .client
                    .get_workload(&workload.namespace, &workload.name)
                    .await
                {
                    warn!(
                        workload = %workload.name,
                        namespace = %workload.namespace,
                        error = %e,
                        "workload lookup failed, dropping remaining ports"
                    );
                    break;
                }

                targets.push(ForwardTarget {
                    context: ctx.context.clone(),
                    namespace: ctx.namespace.clone(),
                    service_name: svc.name.clone(),
                    workload_name: workload.name.clone(),
                    workload_namespace: workload.namespace.clone(),
                    container_port: resolve_target_port(&port.target, &workload),
                    service_port: port.port,
                    short_name: ctx.short_name,
                    remote: ctx.remote,
                });
            }
        }

        Ok(targets)
    }
}

/// Derive label query text (`k=v,k=v`) from a service's selector map.
pub fn selector_text(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve a declared target port against a workload's container ports.
///
/// Numeric targets pass through. Named targets are searched across every
/// container's port declarations; a miss passes the name through unresolved.
fn resolve_target_port(target: &PortTarget, workload: &WorkloadInfo) -> String {
    match target {
        PortTarget::Number(n) => n.to_string(),
        PortTarget::Name(name) => workload
            .containers
            .iter()
            .flat_map(|c| &c.ports)
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| p.port.to_string())
            .unwrap_or_else(|| {
                debug!(port = %name, workload = %workload.name, "named port not found, passing through");
                name.clone()
            }),
    }
}

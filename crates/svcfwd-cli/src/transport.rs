//! Tunnel transport over Kubernetes pod port-forwarding.
//!
//! Each session gets a TCP listener on its dedicated (address, service port)
//! pair. Every accepted connection opens its own port-forward stream to the
//! target pod and relays bytes until either side closes.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::Client;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use svcfwd_core::resolve::ForwardTarget;
use svcfwd_core::tunnel::TunnelTransport;
use svcfwd_core::{Error, Result};

/// Pod port-forward transport, one API client per context.
#[derive(Default)]
pub struct PortForwardTransport {
    clients: HashMap<String, Client>,
}

impl PortForwardTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the client serving `context`.
    pub fn insert(&mut self, context: impl Into<String>, client: Client) {
        self.clients.insert(context.into(), client);
    }
}

#[async_trait]
impl TunnelTransport for PortForwardTransport {
    async fn open_tunnel(
        &self,
        target: &ForwardTarget,
        local_addr: Ipv4Addr,
        local_port: u16,
    ) -> Result<()> {
        let client = self
            .clients
            .get(&target.context)
            .ok_or_else(|| Error::Tunnel {
                message: format!("no client for context {}", target.context),
            })?;

        // A named port that never resolved cannot be forwarded.
        let pod_port: u16 = target.container_port.parse().map_err(|_| Error::Tunnel {
            message: format!(
                "target port {:?} of service {} did not resolve to a number",
                target.container_port, target.service_name
            ),
        })?;

        let bind_addr = SocketAddr::from((local_addr, local_port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| Error::Tunnel {
                message: format!("cannot listen on {bind_addr}: {e}"),
            })?;
        debug!(addr = %bind_addr, pod = %target.workload_name, pod_port, "tunnel listening");

        let pods: Api<Pod> = Api::namespaced(client.clone(), &target.workload_namespace);

        loop {
            let (stream, peer) = listener.accept().await.map_err(|e| Error::Tunnel {
                message: format!("accept on {bind_addr} failed: {e}"),
            })?;
            debug!(peer = %peer, pod = %target.workload_name, "accepted tunnel connection");

            let pods = pods.clone();
            let pod = target.workload_name.clone();
            tokio::spawn(async move {
                if let Err(e) = relay(pods, &pod, pod_port, stream).await {
                    warn!(pod = %pod, pod_port, error = %e, "tunnel connection failed");
                }
            });
        }
    }
}

/// Relay one local connection over a fresh pod port-forward stream.
async fn relay(pods: Api<Pod>, pod: &str, pod_port: u16, mut local: TcpStream) -> Result<()> {
    let mut forwarder = pods
        .portforward(pod, &[pod_port])
        .await
        .map_err(|e| Error::Tunnel {
            message: format!("opening port-forward to {pod}:{pod_port}: {e}"),
        })?;
    let mut upstream = forwarder
        .take_stream(pod_port)
        .ok_or_else(|| Error::Tunnel {
            message: format!("port-forward to {pod} exposed no stream for {pod_port}"),
        })?;

    let (sent, received) = tokio::io::copy_bidirectional(&mut local, &mut upstream)
        .await
        .map_err(|e| Error::Tunnel {
            message: format!("relay to {pod}:{pod_port} broke: {e}"),
        })?;
    debug!(pod = %pod, pod_port, sent, received, "tunnel connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(context: &str, container_port: &str) -> ForwardTarget {
        ForwardTarget {
            context: context.into(),
            namespace: "the-project".into(),
            service_name: "api".into(),
            workload_name: "api-0".into(),
            workload_namespace: "the-project".into(),
            container_port: container_port.into(),
            service_port: 80,
            short_name: false,
            remote: false,
        }
    }

    fn offline_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:1".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[tokio::test]
    async fn unknown_context_is_a_tunnel_error() {
        let transport = PortForwardTransport::new();
        let err = transport
            .open_tunnel(&target("missing", "8080"), Ipv4Addr::LOCALHOST, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tunnel { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn unresolved_named_port_is_a_tunnel_error() {
        let mut transport = PortForwardTransport::new();
        transport.insert("primary", offline_client());

        let err = transport
            .open_tunnel(&target("primary", "metrics"), Ipv4Addr::LOCALHOST, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tunnel { .. }));
        assert!(err.to_string().contains("metrics"));
    }
}

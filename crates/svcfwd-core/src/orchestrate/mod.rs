//! Forwarding session orchestration.
//!
//! One concurrent session per resolved forward target. Each session pulls a
//! local address from the allocator, binds it to the configured interface,
//! registers hostname aliases, and runs the tunnel transport until it ends.
//! Whatever the termination cause, the session's resources are reclaimed
//! exactly once, and the join barrier over all sessions gates the single
//! host-table save.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::alloc::IpAllocator;
use crate::hosts::{HostsRegistry, host_aliases};
use crate::iface::InterfaceControl;
use crate::range::AddrRange;
use crate::resolve::ForwardTarget;
use crate::tunnel::TunnelTransport;
use crate::{Error, Result};


/// Lifecycle of a forwarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Target received, no resources claimed yet.
    Pending,
    /// Local address allocated and aliased onto the interface.
    Bound,
    /// Hostname aliases registered, transport running.
    Tunneling,
    /// All claimed resources reclaimed. Terminal.
    Released,
    /// Allocation or binding failed before tunneling started. Terminal.
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Released | SessionPhase::Failed)
    }
}

/// External collaborators shared by every session.
#[derive(Clone)]
pub struct Collaborators {
    pub allocator: Arc<IpAllocator>,
    pub transport: Arc<dyn TunnelTransport>,
    pub hosts: Arc<dyn HostsRegistry>,
    pub iface: Arc<dyn InterfaceControl>,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interface that receives the address aliases.
    pub interface: String,
    /// Allocation range for local addresses.
    pub range: AddrRange,
    /// Treat the first session failure as fatal: drain the remaining
    /// sessions and return the error.
    pub exit_on_fail: bool,
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub requested: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Triggers cooperative shutdown of all in-flight sessions.
#[derive(Clone)]
pub struct ShutdownHandle(watch::Sender<bool>);

impl ShutdownHandle {
    /// Ask every session to close its tunnel and drain through release.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// Fans sessions out over forward targets and joins them before the
/// host table is persisted.
pub struct Orchestrator {
    ctx: SessionContext,
    exit_on_fail: bool,
    shutdown_tx: watch::Sender<bool>,
}

/// Everything a spawned session needs, cloneable into its task.
#[derive(Clone)]
struct SessionContext {
    allocator: Arc<IpAllocator>,
    transport: Arc<dyn TunnelTransport>,
    hosts: Arc<dyn HostsRegistry>,
    iface: Arc<dyn InterfaceControl>,
    /// Serializes interface list+mutate so no session acts on stale state.
    iface_lock: Arc<Mutex<()>>,
    interface: String,
    range: Arc<AddrRange>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, collab: Collaborators) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ctx: SessionContext {
                allocator: collab.allocator,
                transport: collab.transport,
                hosts: collab.hosts,
                iface: collab.iface,
                iface_lock: Arc::new(Mutex::new(())),
                interface: config.interface,
                range: Arc::new(config.range),
            },
            exit_on_fail: config.exit_on_fail,
            shutdown_tx,
        }
    }

    /// Handle for wiring process signals to cooperative session shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Run one session per target, join them all, then persist the host
    /// table once.
    ///
    /// Session failures are logged and counted; they only fail the run when
    /// `exit_on_fail` is set, in which case the remaining sessions are
    /// drained first and the first error is returned after the save.
    pub async fn run(&self, targets: Vec<ForwardTarget>) -> Result<RunReport> {
        let mut report = RunReport {
            requested: targets.len(),
            ..RunReport::default()
        };

        let mut sessions = JoinSet::new();
        for target in targets {
            let ctx = self.ctx.clone();
            let shutdown = self.shutdown_tx.subscribe();
            sessions.spawn(async move { run_session(ctx, target, shutdown).await });
        }

        let mut first_failure = None;
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(Ok(())) => report.completed += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(error = %e, "session failed");
                    if self.exit_on_fail && first_failure.is_none() {
                        self.shutdown_tx.send_replace(true);
                        first_failure = Some(e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "session task aborted");
                }
            }
        }

        // Every session has finished its teardown; now the table is final.
        self.ctx.hosts.save().await?;

        match first_failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// Drive one session through its whole lifecycle.
async fn run_session(
    ctx: SessionContext,
    target: ForwardTarget,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut session = Session::pending(target, ctx.interface.clone());
    let local_addr = session.bind(&ctx).await?;
    info!(
        service = %session.target.service_name,
        namespace = %session.target.namespace,
        addr = %local_addr,
        port = session.local_port,
        pod = %session.target.workload_name,
        pod_port = %session.target.container_port,
        "forwarding"
    );

    let result = session.tunnel(&ctx, &mut shutdown).await;

    // Released: runs on every path once the session was bound, and the
    // join-barrier slot resolves only after it completes.
    session.release(&ctx).await;

    match &result {
        Ok(()) => info!(
            service = %session.target.service_name,
            namespace = %session.target.namespace,
            "stopped forwarding"
        ),
        Err(e) => warn!(
            service = %session.target.service_name,
            namespace = %session.target.namespace,
            error = %e,
            "forwarding ended with error"
        ),
    }

    result
}

/// A forwarding session and the resources it owns.
struct Session {
    target: ForwardTarget,
    /// Set once the session reaches `Bound`.
    local_addr: Option<Ipv4Addr>,
    local_port: u16,
    interface: String,
    /// Aliases actually registered, in registration order.
    registered: Vec<String>,
    phase: SessionPhase,
}

impl Session {
    fn pending(target: ForwardTarget, interface: String) -> Self {
        let local_port = target.service_port;
        Self {
            target,
            local_addr: None,
            local_port,
            interface,
            registered: Vec::new(),
            phase: SessionPhase::Pending,
        }
    }

    /// Claim a local address and alias it onto the interface. Failure is
    /// terminal: the session owns nothing and ends in `Failed`.
    async fn bind(&mut self, ctx: &SessionContext) -> Result<Ipv4Addr> {
        // Exhaustion drops this target only.
        let local_addr = match ctx.allocator.allocate(&ctx.range).await {
            Ok(addr) => addr,
            Err(e) => {
                self.phase = SessionPhase::Failed;
                return Err(e);
            }
        };

        // List+mutate stays behind the shared lock.
        let aliased = {
            let _guard = ctx.iface_lock.lock().await;
            ctx.iface.add_alias(local_addr, &ctx.interface).await
        };
        if let Err(e) = aliased {
            self.phase = SessionPhase::Failed;
            return Err(Error::Binding {
                message: format!("cannot alias {local_addr} on {}: {e}", ctx.interface),
            });
        }

        self.local_addr = Some(local_addr);
        self.phase = SessionPhase::Bound;
        Ok(local_addr)
    }

    /// Register hostname aliases and run the transport until the tunnel ends
    /// or shutdown is requested.
    async fn tunnel(
        &mut self,
        ctx: &SessionContext,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let Some(local_addr) = self.local_addr else {
            return Ok(());
        };

        for alias in host_aliases(&self.target) {
            ctx.hosts.add_alias(&alias, local_addr).await?;
            self.registered.push(alias);
        }
        self.phase = SessionPhase::Tunneling;
        debug!(aliases = ?self.registered, addr = %local_addr, "registered hostname aliases");

        if *shutdown.borrow() {
            return Ok(());
        }

        tokio::select! {
            result = ctx
                .transport
                .open_tunnel(&self.target, local_addr, self.local_port) => result,
            _ = shutdown.changed() => {
                debug!(service = %self.target.service_name, "shutdown requested, closing tunnel");
                Ok(())
            }
        }
    }

    /// Reclaim everything this session registered. Runs to completion at
    /// most once; errors are logged, never propagated, so teardown of one
    /// resource cannot skip the others.
    async fn release(&mut self, ctx: &SessionContext) {
        if self.phase == SessionPhase::Released {
            return;
        }

        for alias in self.registered.drain(..) {
            if let Err(e) = ctx.hosts.remove_alias(&alias).await {
                warn!(alias = %alias, error = %e, "failed to remove hostname alias");
            }
        }

        if let Some(local_addr) = self.local_addr {
            let _guard = ctx.iface_lock.lock().await;
            match ctx.iface.list_aliases(&self.interface).await {
                Ok(aliases) if aliases.contains(&local_addr) => {
                    if let Err(e) = ctx.iface.remove_alias(local_addr, &self.interface).await {
                        warn!(
                            addr = %local_addr,
                            iface = %self.interface,
                            error = %e,
                            "failed to remove interface alias"
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(iface = %self.interface, error = %e, "failed to list interface aliases");
                }
            }
        }

        self.phase = SessionPhase::Released;
    }
}

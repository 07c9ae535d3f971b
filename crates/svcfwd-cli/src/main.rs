//! svcfwd binary entry point.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::Parser;
use tracing::{error, info, warn};

use svcfwd_cli::Cli;
use svcfwd_cli::hosts::EtcHosts;
use svcfwd_cli::iface::IpCommand;
use svcfwd_cli::kube::{KubeClient, context_namespace, load_kubeconfig};
use svcfwd_cli::probe::PingProber;
use svcfwd_cli::transport::PortForwardTransport;
use svcfwd_core::alloc::IpAllocator;
use svcfwd_core::orchestrate::{Collaborators, Orchestrator, OrchestratorConfig};
use svcfwd_core::range::AddrRange;
use svcfwd_core::resolve::{ResolveContext, Resolver};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = svcfwd_core::init_logging(
        cli.log_verbosity(),
        cli.log_file.as_deref(),
        cli.log_format.into(),
    ) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if !nix::unistd::geteuid().is_root() {
        eprintln!(
            "\nThis program requires superuser privileges: adding address\n\
             aliases to a local interface and listening on low ports both\n\
             need them.\n\n\
             Try: sudo -E svcfwd ...\n"
        );
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "svcfwd failed");
        eprintln!("svcfwd: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "svcfwd starting");

    let range = AddrRange::parse(&cli.network_range)
        .with_context(|| format!("invalid --network-range {:?}", cli.network_range))?;

    let kubeconfig = load_kubeconfig(cli.kubeconfig.as_deref())?;

    let contexts = if cli.contexts.is_empty() {
        match &kubeconfig.current_context {
            Some(current) => vec![current.clone()],
            None => bail!("kubeconfig has no current context; use --context"),
        }
    } else {
        cli.contexts.clone()
    };

    let namespaces = if cli.namespaces.is_empty() {
        match context_namespace(&kubeconfig, &contexts[0]) {
            Some(ns) => {
                info!(namespace = %ns, context = %contexts[0], "using namespace from context");
                vec![ns]
            }
            None => vec!["default".to_string()],
        }
    } else {
        cli.namespaces.clone()
    };

    // Resolve every (context, namespace) pair up front; resolution failures
    // reduce coverage but never abort the run.
    let mut transport = PortForwardTransport::new();
    let mut targets = Vec::new();
    for (i, context) in contexts.iter().enumerate() {
        let kube_client = KubeClient::from_kubeconfig(kubeconfig.clone(), context).await?;
        transport.insert(context.clone(), kube_client.client());

        let resolver = Resolver::new(Arc::new(kube_client));
        for (ii, namespace) in namespaces.iter().enumerate() {
            let ctx = ResolveContext {
                context: context.clone(),
                namespace: namespace.clone(),
                selector: cli.selector.clone(),
                // Only the first namespace of the first context gets
                // unqualified short names.
                short_name: i == 0 && ii == 0,
                remote: i > 0,
            };
            match resolver.resolve(&ctx).await {
                Ok(mut resolved) => targets.append(&mut resolved),
                Err(e) => {
                    error!(context = %context, namespace = %namespace, error = %e, "resolution failed");
                }
            }
        }
    }

    if targets.is_empty() {
        warn!("no services matched; nothing to forward");
    }

    let hosts = Arc::new(EtcHosts::load(&cli.hosts_file)?);
    info!(hosts = %cli.hosts_file.display(), "managing hosts file");

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            interface: cli.iface.clone(),
            range,
            exit_on_fail: cli.exit_on_fail,
        },
        Collaborators {
            allocator: Arc::new(IpAllocator::new(Arc::new(PingProber))),
            transport: Arc::new(transport),
            hosts,
            iface: Arc::new(IpCommand),
        },
    );

    let shutdown = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, draining sessions");
            shutdown.shutdown();
        }
    });

    info!("press Ctrl-C to stop forwarding");
    let report = orchestrator.run(targets).await?;
    info!(
        requested = report.requested,
        completed = report.completed,
        failed = report.failed,
        "done"
    );

    Ok(())
}

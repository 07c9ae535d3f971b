//! Command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use svcfwd_core::constants::{DEFAULT_INTERFACE, DEFAULT_NETWORK_RANGE};

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for svcfwd_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => svcfwd_core::LogFormat::Text,
            CliLogFormat::Json => svcfwd_core::LogFormat::Json,
        }
    }
}

/// Forward cluster services to dedicated local addresses.
#[derive(Debug, Parser)]
#[command(
    name = "svcfwd",
    version,
    about = "Forward cluster services to dedicated local addresses",
    after_help = "Examples:\n  \
        sudo -E svcfwd -n the-project\n  \
        sudo -E svcfwd -n the-project -l app=wx,component=api\n  \
        sudo -E svcfwd -n default -n the-project\n  \
        sudo -E svcfwd -n the-project -x prod-cluster"
)]
pub struct Cli {
    /// Path to the kubeconfig file (defaults to ~/.kube/config)
    #[arg(short = 'c', long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Context to forward from; repeat for multiple clusters
    #[arg(short = 'x', long = "context")]
    pub contexts: Vec<String>,

    /// Namespace to forward from; repeat for multiple namespaces
    #[arg(short = 'n', long = "namespace")]
    pub namespaces: Vec<String>,

    /// Label selector to filter services (e.g. key1=value1,key2=value2)
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Treat the first session failure as fatal and exit non-zero
    #[arg(long)]
    pub exit_on_fail: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t)]
    pub log_format: CliLogFormat,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Network interface that receives the address aliases
    #[arg(long, default_value = DEFAULT_INTERFACE)]
    pub iface: String,

    /// Local address allocation range
    #[arg(long, default_value = DEFAULT_NETWORK_RANGE)]
    pub network_range: String,

    /// Hosts file to manage
    #[arg(long, default_value = "/etc/hosts")]
    pub hosts_file: PathBuf,
}

impl Cli {
    /// Verbosity mapped onto the logging scale (default info).
    pub fn log_verbosity(&self) -> u8 {
        2 + self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["svcfwd"]);
        assert_eq!(cli.iface, "lo");
        assert_eq!(cli.network_range, DEFAULT_NETWORK_RANGE);
        assert_eq!(cli.log_verbosity(), 2);
        assert!(cli.contexts.is_empty());
        assert!(!cli.exit_on_fail);
    }

    #[test]
    fn repeated_namespaces_and_contexts() {
        let cli = Cli::parse_from([
            "svcfwd", "-n", "default", "-n", "the-project", "-x", "prod-cluster",
        ]);
        assert_eq!(cli.namespaces, vec!["default", "the-project"]);
        assert_eq!(cli.contexts, vec!["prod-cluster"]);
    }

    #[test]
    fn verbosity_accumulates() {
        let cli = Cli::parse_from(["svcfwd", "-vv"]);
        assert_eq!(cli.log_verbosity(), 4);
    }
}

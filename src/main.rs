mod commands;
mod config;
mod diagnostics;
mod domain;
mod error;
mod k8s;
mod manifests;
mod provider;
mod tls;
mod validations;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::support_bundle::SupportBundleOptions;
use crate::commands::validate::ValidateArgs;
use crate::config::{Config, LogFormat};

#[derive(Parser)]
#[command(
    name = "eksa-preflight",
    version,
    about = "Preflight validations and support bundles for EKS Anywhere clusters"
)]
struct Cli {
    /// Path to config file (default: ~/.config/eksa-preflight/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CLI version
    Version,

    /// Run the preflight checks for a cluster lifecycle operation
    Validate {
        #[command(subcommand)]
        command: ValidateCommands,
    },

    /// Check a workload EksaVersion against its management cluster's
    Skew {
        /// Management cluster EksaVersion
        #[arg(long)]
        management: String,

        /// Workload cluster EksaVersion
        #[arg(long)]
        workload: String,
    },

    /// Collect and analyze a support bundle for a cluster
    SupportBundle {
        /// Cluster config file
        #[arg(short, long)]
        file: PathBuf,

        /// Workload cluster kubeconfig (default: <name>/<name>-eks-a-cluster.kubeconfig)
        #[arg(short, long)]
        w_config: Option<PathBuf>,

        /// Only collect logs newer than this duration, e.g. 2h or 1h30m
        #[arg(long)]
        since: Option<String>,

        /// Only collect logs newer than this RFC3339 timestamp
        #[arg(long)]
        since_time: Option<String>,

        /// SupportBundle spec to use instead of the generated one
        #[arg(long)]
        bundle_config: Option<PathBuf>,

        /// Bundles manifest to embed in the bundle (path or URL)
        #[arg(long)]
        bundles_manifest: Option<String>,

        /// Also collect kube-apiserver audit logs
        #[arg(long)]
        audit_logs: bool,
    },
}

#[derive(Subcommand)]
enum ValidateCommands {
    /// Checks run before creating a cluster
    Create(ClusterArgs),

    /// Checks run before upgrading a cluster
    Upgrade(ClusterArgs),

    /// Checks run before upgrading management components
    ManagementComponents {
        #[command(flatten)]
        cluster: ClusterArgs,

        /// EksaVersion of the proposed management components
        #[arg(long)]
        components_version: String,
    },
}

#[derive(Args)]
struct ClusterArgs {
    /// Cluster config file
    #[arg(short, long)]
    file: PathBuf,

    /// Bundles manifest to use instead of the release's (path or URL)
    #[arg(long)]
    bundles_override: Option<String>,

    /// Management cluster kubeconfig (default: <mgmt>/<mgmt>-eks-a-cluster.kubeconfig)
    #[arg(long)]
    management_kubeconfig: Option<PathBuf>,
}

impl From<ClusterArgs> for ValidateArgs {
    fn from(args: ClusterArgs) -> Self {
        ValidateArgs {
            file: args.file,
            bundles_override: args.bundles_override,
            management_kubeconfig: args.management_kubeconfig,
        }
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Version => commands::version::run(&config),
        Commands::Validate { command } => match command {
            ValidateCommands::Create(args) => commands::validate::create(&config, &args.into()),
            ValidateCommands::Upgrade(args) => commands::validate::upgrade(&config, &args.into()),
            ValidateCommands::ManagementComponents {
                cluster,
                components_version,
            } => commands::validate::management_components(
                &config,
                &cluster.into(),
                &components_version,
            ),
        },
        Commands::Skew {
            management,
            workload,
        } => commands::skew::run(&management, &workload),
        Commands::SupportBundle {
            file,
            w_config,
            since,
            since_time,
            bundle_config,
            bundles_manifest,
            audit_logs,
        } => commands::support_bundle::run(
            &config,
            &SupportBundleOptions {
                file,
                w_config,
                since,
                since_time,
                bundle_config,
                bundles_manifest,
                audit_logs,
            },
        ),
    }
}

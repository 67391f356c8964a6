use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "noderank",
    about = "noderank — rank cluster nodes for a pod",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank every node of a cluster snapshot for one pod.
    ///
    /// The snapshot and pod are JSON documents. Without --policy the
    /// built-in default policy is used.
    Rank {
        /// Cluster snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Pod to place (JSON)
        #[arg(short, long)]
        pod: PathBuf,
        /// Scheduler policy (TOML)
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Abandon the ranking after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print a scheduler policy as TOML.
    Policy {
        /// Validate this policy file instead of printing the default
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,noderank=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            snapshot,
            pod,
            policy,
            format,
            timeout_ms,
        } => {
            let args = commands::rank::RankArgs {
                snapshot,
                pod,
                policy,
                format,
                timeout_ms,
            };
            commands::rank::rank(args).await
        }
        Commands::Policy { check } => commands::policy::policy(check.as_deref()),
    }
}

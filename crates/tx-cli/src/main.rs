mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};

use tx_core::kernel::{self, KernelConfig};

use commands::coordinator::CoordinatorCommands;
use commands::learning::{AnchorCommands, LearningCommands, OutboxCommands};
use commands::task::TaskCommands;
use commands::trace::TraceCommands;
use commands::worker::WorkerCommands;
use config::TxConfig;
use output::{print_error, CliError, CmdResult};

#[derive(Parser)]
#[command(name = "tx", about = "Local-first task coordination kernel for autonomous coding agents")]
struct Cli {
    /// SQLite database path (overrides TX_DB_PATH env var and config file)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Emit machine-readable JSON on stdout instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Singleton orchestrator lifecycle
    Coordinator {
        #[command(subcommand)]
        command: CoordinatorCommands,
    },
    /// Agent run bookkeeping and transcripts
    Trace {
        #[command(subcommand)]
        command: TraceCommands,
    },
    /// Table counts and orchestrator summary
    Stats,
    /// Task CRUD, claims, and dependency edges
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Learning CRUD, retrieval, and candidate review
    Learning {
        #[command(subcommand)]
        command: LearningCommands,
    },
    /// Inter-agent outbox messaging
    Outbox {
        #[command(subcommand)]
        command: OutboxCommands,
    },
    /// Code-location anchors for learnings
    Anchor {
        #[command(subcommand)]
        command: AnchorCommands,
    },
    /// Worker registration and liveness
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
}

async fn dispatch(cli: Cli) -> CmdResult<()> {
    let tx_config = TxConfig::resolve(cli.db_path.as_deref())
        .map_err(|e| CliError::Usage(e.to_string()))?;
    let kernel = kernel::build(KernelConfig {
        db_path: Some(tx_config.db_config.database_path),
        ..Default::default()
    })
    .await?;

    match cli.command {
        Commands::Coordinator { command } => commands::coordinator::run(&kernel, cli.json, command).await,
        Commands::Trace { command } => commands::trace::run(&kernel, cli.json, command).await,
        Commands::Stats => commands::trace::run_stats(&kernel, cli.json).await,
        Commands::Task { command } => commands::task::run(&kernel, cli.json, command).await,
        Commands::Learning { command } => commands::learning::run(&kernel, cli.json, command).await,
        Commands::Outbox { command } => commands::learning::run_outbox(&kernel, cli.json, command).await,
        Commands::Anchor { command } => commands::learning::run_anchors(&kernel, cli.json, command).await,
        Commands::Worker { command } => commands::worker::run(&kernel, cli.json, command).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = dispatch(cli).await {
        print_error(json_mode, &err);
        std::process::exit(err.exit_code());
    }
}

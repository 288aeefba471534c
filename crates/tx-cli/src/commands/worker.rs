//! `tx worker {register|get|list|heartbeat|offline}`.

use clap::Subcommand;

use tx_core::kernel::Kernel;
use tx_core::workers::{self, RegisterInput};

use crate::output::{CliError, CmdResult, emit};

#[derive(Subcommand)]
pub enum WorkerCommands {
    /// Register a new worker process.
    Register {
        name: String,
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        pid: Option<i64>,
        #[arg(long, default_value = "{}")]
        capabilities: String,
    },
    Get { id: String },
    List,
    /// Refresh a worker's liveness timestamp.
    Heartbeat { id: String },
    Offline { id: String },
}

pub async fn run(kernel: &Kernel, json_mode: bool, command: WorkerCommands) -> CmdResult<()> {
    match command {
        WorkerCommands::Register {
            name,
            hostname,
            pid,
            capabilities,
        } => {
            let hostname = hostname.unwrap_or_else(|| {
                hostname_of_this_machine().unwrap_or_else(|| "unknown".to_string())
            });
            let pid = pid.unwrap_or_else(|| std::process::id() as i64);
            let worker = workers::register(
                &kernel.pool,
                RegisterInput {
                    name: &name,
                    hostname: &hostname,
                    pid,
                    capabilities: &capabilities,
                },
            )
            .await
            .map_err(CliError::from)?;
            emit(json_mode, &worker, |w| println!("registered {} ({}, pid {})", w.id, w.name, w.pid));
            Ok(())
        }
        WorkerCommands::Get { id } => {
            let worker = workers::get(&kernel.pool, &id).await.map_err(CliError::from)?;
            emit(json_mode, &worker, |w| {
                println!("{} [{}] {} @ {} (pid {})", w.id, w.status, w.name, w.hostname, w.pid);
            });
            Ok(())
        }
        WorkerCommands::List => {
            let workers = workers::list(&kernel.pool).await.map_err(CliError::from)?;
            emit(json_mode, &workers, |workers| {
                for w in workers {
                    println!("{} [{}] {} @ {}", w.id, w.status, w.name, w.hostname);
                }
            });
            Ok(())
        }
        WorkerCommands::Heartbeat { id } => {
            workers::heartbeat(&kernel.pool, &id).await.map_err(CliError::from)?;
            if !json_mode {
                println!("heartbeat recorded for {id}");
            }
            Ok(())
        }
        WorkerCommands::Offline { id } => {
            workers::set_offline(&kernel.pool, &id).await.map_err(CliError::from)?;
            if !json_mode {
                println!("{id} marked offline");
            }
            Ok(())
        }
    }
}

fn hostname_of_this_machine() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        std::process::Command::new("hostname")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
    })
}

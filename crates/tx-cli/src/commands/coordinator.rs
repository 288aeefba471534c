//! `tx coordinator {start|stop|status|reconcile}`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Subcommand;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use tx_core::kernel::Kernel;
use tx_core::orchestrator;

use crate::output::{CliError, CmdResult, emit};

#[derive(Subcommand)]
pub enum CoordinatorCommands {
    /// Claim the singleton orchestrator slot and run the reconcile loop
    /// in the foreground until interrupted.
    Start {
        #[arg(long, default_value_t = 4)]
        worker_pool_size: i64,
        #[arg(long, default_value_t = 30)]
        heartbeat_interval_seconds: i64,
        #[arg(long, default_value_t = 30)]
        lease_duration_minutes: i64,
        #[arg(long, default_value_t = 60)]
        reconcile_interval_seconds: i64,
    },
    /// Stop a running coordinator (CAS `running -> stopping`).
    Stop {
        #[arg(long)]
        graceful: bool,
    },
    /// Print the singleton orchestrator row.
    Status,
    /// Run a single `reconcile()` pass without claiming the start/stop
    /// lifecycle.
    Reconcile,
}

pub async fn run(kernel: &Kernel, json_mode: bool, command: CoordinatorCommands) -> CmdResult<()> {
    match command {
        CoordinatorCommands::Start {
            worker_pool_size,
            heartbeat_interval_seconds,
            lease_duration_minutes,
            reconcile_interval_seconds,
        } => {
            let pid = std::process::id() as i64;
            orchestrator::start(
                &kernel.pool,
                pid,
                orchestrator::StartOptions {
                    worker_pool_size,
                    heartbeat_interval_seconds,
                    lease_duration_minutes,
                    reconcile_interval_seconds,
                },
            )
            .await
            .map_err(CliError::from)?;

            if !json_mode {
                println!("coordinator started (pid {pid}), reconciling every {reconcile_interval_seconds}s");
                println!("press Ctrl+C to stop");
            }

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            let got_first_signal = Arc::new(AtomicBool::new(false));
            let got_first_clone = Arc::clone(&got_first_signal);
            tokio::spawn(async move {
                loop {
                    tokio::signal::ctrl_c().await.ok();
                    if got_first_clone.swap(true, Ordering::SeqCst) {
                        eprintln!("\nforce exit");
                        std::process::exit(130);
                    }
                    eprintln!("\nshutting down (Ctrl+C again to force)...");
                    cancel_clone.cancel();
                }
            });

            orchestrator::run_loop(kernel.pool.clone(), reconcile_interval_seconds, cancel).await;
            orchestrator::stop(&kernel.pool, true).await.map_err(CliError::from)?;
            Ok(())
        }
        CoordinatorCommands::Stop { graceful } => {
            orchestrator::stop(&kernel.pool, graceful).await.map_err(CliError::from)?;
            if !json_mode {
                println!("coordinator stopped");
            }
            Ok(())
        }
        CoordinatorCommands::Status => {
            let state = orchestrator::status(&kernel.pool).await.map_err(CliError::from)?;
            emit(json_mode, &state, |s| {
                println!("status: {}", s.status);
                println!("pid: {}", s.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()));
                println!(
                    "started_at: {}",
                    s.started_at.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into())
                );
                println!(
                    "last_reconcile_at: {}",
                    s.last_reconcile_at.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into())
                );
                println!(
                    "worker_pool_size={} heartbeat_interval_seconds={} lease_duration_minutes={} reconcile_interval_seconds={}",
                    s.worker_pool_size, s.heartbeat_interval_seconds, s.lease_duration_minutes, s.reconcile_interval_seconds
                );
            });
            Ok(())
        }
        CoordinatorCommands::Reconcile => {
            let report = orchestrator::reconcile(&kernel.pool).await.map_err(CliError::from)?;
            let value = json!({
                "dead_workers_found": report.dead_workers_found,
                "expired_claims_released": report.expired_claims_released,
                "orphaned_tasks_recovered": report.orphaned_tasks_recovered,
                "stale_states_fixed": report.stale_states_fixed,
            });
            emit(json_mode, &value, |v| {
                println!(
                    "dead_workers_found={} expired_claims_released={} orphaned_tasks_recovered={} stale_states_fixed={}",
                    v["dead_workers_found"], v["expired_claims_released"], v["orphaned_tasks_recovered"], v["stale_states_fixed"]
                );
            });
            Ok(())
        }
    }
}

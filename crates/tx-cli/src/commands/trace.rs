//! `tx trace {list|show|transcript}` and `tx stats`.

use clap::Subcommand;
use serde_json::json;

use tx_core::kernel::Kernel;
use tx_core::{runs, transcript};

use crate::output::{CliError, CmdResult, emit};

#[derive(Subcommand)]
pub enum TraceCommands {
    /// List recent agent runs, most recent first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a single run's bookkeeping row.
    Show { run_id: String },
    /// Parse and print the tool calls in a transcript file.
    Transcript {
        /// Transcript file path. Omit to resolve the run's own
        /// `transcript_path` via `--run`.
        path: Option<String>,
        #[arg(long)]
        run: Option<String>,
    },
}

pub async fn run(kernel: &Kernel, json_mode: bool, command: TraceCommands) -> CmdResult<()> {
    match command {
        TraceCommands::List { limit } => {
            let rows = runs::list_recent(&kernel.pool, limit).await.map_err(CliError::from)?;
            emit(json_mode, &rows, |rows| {
                for r in rows {
                    println!(
                        "{} [{}] agent={} task={}",
                        r.id,
                        r.status,
                        r.agent,
                        r.task_id.as_deref().unwrap_or("-")
                    );
                }
            });
            Ok(())
        }
        TraceCommands::Show { run_id } => {
            let r = runs::get(&kernel.pool, &run_id).await.map_err(CliError::from)?;
            emit(json_mode, &r, |r| {
                println!("run: {}", r.id);
                println!("status: {}", r.status);
                println!("agent: {}", r.agent);
                println!("task_id: {}", r.task_id.as_deref().unwrap_or("-"));
                println!("pid: {}", r.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()));
                println!("started_at: {}", r.started_at.to_rfc3339());
                println!("ended_at: {}", r.ended_at.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into()));
                println!("exit_code: {}", r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()));
                println!("transcript_path: {}", r.transcript_path.as_deref().unwrap_or("-"));
            });
            Ok(())
        }
        TraceCommands::Transcript { path, run } => {
            let resolved_path = match (path, run) {
                (Some(p), _) => p,
                (None, Some(run_id)) => {
                    let r = runs::get(&kernel.pool, &run_id).await.map_err(CliError::from)?;
                    r.transcript_path.ok_or_else(|| {
                        CliError::Usage(format!("run {run_id} has no recorded transcript_path"))
                    })?
                }
                (None, None) => {
                    return Err(CliError::Usage("either a transcript path or --run <id> is required".into()));
                }
            };

            let calls = transcript::read_file(&resolved_path).await.map_err(CliError::from)?;
            emit(json_mode, &calls, |calls| {
                for call in calls {
                    println!("{} {} {}", call.timestamp.to_rfc3339(), call.name, call.input);
                }
            });
            Ok(())
        }
    }
}

pub async fn run_stats(kernel: &Kernel, json_mode: bool) -> CmdResult<()> {
    let counts = kernel.table_counts().await.map_err(CliError::from)?;
    let orchestrator = tx_core::orchestrator::status(&kernel.pool).await.ok();

    let value = json!({
        "table_counts": counts.iter().map(|(t, c)| json!({"table": t, "count": c})).collect::<Vec<_>>(),
        "orchestrator_status": orchestrator.as_ref().map(|s| s.status.to_string()),
    });

    emit(json_mode, &value, |v| {
        println!("table counts:");
        for row in v["table_counts"].as_array().unwrap() {
            println!("  {}: {}", row["table"].as_str().unwrap(), row["count"]);
        }
        println!(
            "orchestrator status: {}",
            v["orchestrator_status"].as_str().unwrap_or("unknown")
        );
    });
    Ok(())
}

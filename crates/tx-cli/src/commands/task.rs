//! `tx task {create|get|update|list|remove|claim|release|renew|add-dependency|remove-dependency}`.

use std::str::FromStr;

use clap::Subcommand;

use tx_db::models::TaskStatus;
use tx_core::kernel::Kernel;
use tx_core::{claims, dependencies, tasks};
use tx_core::tasks::{ListFilter, NewTaskInput, TaskUpdate};

use crate::output::{CliError, CmdResult, emit};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a new task.
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value_t = 0)]
        score: i64,
        #[arg(long, default_value = "{}")]
        metadata: String,
    },
    /// Fetch a task with its hydrated dependency/children view.
    Get { id: String },
    /// Update fields and/or transition status.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        clear_parent: bool,
        #[arg(long)]
        score: Option<i64>,
        /// A valid next status per the task lifecycle matrix.
        #[arg(long)]
        status: Option<String>,
    },
    /// List tasks, optionally filtered by status.
    List {
        #[arg(long = "status")]
        statuses: Vec<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Delete a task; `--cascade` also deletes its descendant subtree.
    Remove {
        id: String,
        #[arg(long)]
        cascade: bool,
    },
    /// Acquire a lease on a task for a worker.
    Claim {
        id: String,
        worker_id: String,
        #[arg(long)]
        lease_minutes: Option<i64>,
    },
    /// Release a held claim.
    Release { id: String, worker_id: String },
    /// Extend an active lease.
    Renew {
        id: String,
        worker_id: String,
        #[arg(long)]
        lease_minutes: Option<i64>,
    },
    /// `id` depends on `--blocker`: `blocker` must reach `done` first.
    AddDependency {
        id: String,
        #[arg(long)]
        blocker: String,
    },
    RemoveDependency {
        id: String,
        #[arg(long)]
        blocker: String,
    },
}

fn parse_status(raw: &str) -> CmdResult<TaskStatus> {
    TaskStatus::from_str(raw).map_err(|e| CliError::Usage(format!("invalid status {raw:?}: {e}")))
}

fn print_task_with_deps(t: &tasks::TaskWithDeps) {
    println!("{} [{}] {}", t.task.id, t.task.status, t.task.title);
    if let Some(parent) = &t.task.parent_id {
        println!("  parent: {parent}");
    }
    println!("  ready: {}", t.is_ready);
    println!("  blocked_by: {}", t.blocked_by.join(", "));
    println!("  blocks: {}", t.blocks.join(", "));
    println!("  children: {}", t.children.join(", "));
}

pub async fn run(kernel: &Kernel, json_mode: bool, command: TaskCommands) -> CmdResult<()> {
    match command {
        TaskCommands::Create {
            title,
            description,
            parent,
            score,
            metadata,
        } => {
            let task = tasks::create(
                &kernel.pool,
                NewTaskInput {
                    title: &title,
                    description: description.as_deref(),
                    parent_id: parent.as_deref(),
                    score,
                    metadata: &metadata,
                },
            )
            .await
            .map_err(CliError::from)?;
            emit(json_mode, &task, |t| println!("created {} [{}] {}", t.id, t.status, t.title));
            Ok(())
        }
        TaskCommands::Get { id } => {
            let task = tasks::get_with_deps(&kernel.pool, &id).await.map_err(CliError::from)?;
            emit(json_mode, &task, print_task_with_deps);
            Ok(())
        }
        TaskCommands::Update {
            id,
            title,
            description,
            clear_description,
            parent,
            clear_parent,
            score,
            status,
        } => {
            let status = status.map(|s| parse_status(&s)).transpose()?;
            let description_update = if clear_description {
                Some(None)
            } else {
                description.as_deref().map(Some)
            };
            let parent_update = if clear_parent { Some(None) } else { parent.as_deref().map(Some) };

            let task = tasks::update(
                &kernel.pool,
                &id,
                TaskUpdate {
                    title: title.as_deref(),
                    description: description_update,
                    parent_id: parent_update,
                    score,
                    status,
                },
            )
            .await
            .map_err(CliError::from)?;
            emit(json_mode, &task, |t| println!("updated {} [{}] {}", t.id, t.status, t.title));
            Ok(())
        }
        TaskCommands::List { statuses, limit } => {
            let statuses = statuses
                .iter()
                .map(|s| parse_status(s))
                .collect::<CmdResult<Vec<_>>>()?;
            let tasks = tasks::list_with_deps(&kernel.pool, ListFilter { statuses, limit })
                .await
                .map_err(CliError::from)?;
            emit(json_mode, &tasks, |tasks| {
                for t in tasks {
                    print_task_with_deps(t);
                }
            });
            Ok(())
        }
        TaskCommands::Remove { id, cascade } => {
            tasks::remove(&kernel.pool, &id, cascade).await.map_err(CliError::from)?;
            if !json_mode {
                println!("removed {id}");
            }
            Ok(())
        }
        TaskCommands::Claim { id, worker_id, lease_minutes } => {
            let claim = claims::claim(&kernel.pool, &id, &worker_id, lease_minutes)
                .await
                .map_err(CliError::from)?;
            emit(json_mode, &claim, |c| {
                println!("claimed {} by {} (lease expires {})", c.task_id, c.worker_id, c.lease_expires_at.to_rfc3339());
            });
            Ok(())
        }
        TaskCommands::Release { id, worker_id } => {
            claims::release(&kernel.pool, &id, &worker_id).await.map_err(CliError::from)?;
            if !json_mode {
                println!("released {id}");
            }
            Ok(())
        }
        TaskCommands::Renew { id, worker_id, lease_minutes } => {
            let claim = claims::renew(&kernel.pool, &id, &worker_id, lease_minutes)
                .await
                .map_err(CliError::from)?;
            emit(json_mode, &claim, |c| {
                println!("renewed {} (count={}, expires {})", c.task_id, c.renewed_count, c.lease_expires_at.to_rfc3339());
            });
            Ok(())
        }
        TaskCommands::AddDependency { id, blocker } => {
            dependencies::add_blocker(&kernel.pool, &id, &blocker).await.map_err(CliError::from)?;
            if !json_mode {
                println!("{id} now blocked by {blocker}");
            }
            Ok(())
        }
        TaskCommands::RemoveDependency { id, blocker } => {
            dependencies::remove_blocker(&kernel.pool, &id, &blocker).await.map_err(CliError::from)?;
            if !json_mode {
                println!("{id} no longer blocked by {blocker}");
            }
            Ok(())
        }
    }
}

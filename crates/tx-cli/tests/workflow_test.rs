//! End-to-end workflow tests exercising the same `tx_core` calls the CLI
//! command handlers wrap, against a real migrated SQLite database.

use async_trait::async_trait;
use chrono::Utc;

use tx_core::capabilities::Summarizer;
use tx_core::errors::Result as TxResult;
use tx_core::{claims, dependencies, orchestrator, outbox, promotion, runs, tasks, workers};
use tx_db::models::{Task, TaskStatus};
use tx_test_utils::create_test_db;

async fn make_task(pool: &sqlx::SqlitePool, title: &str) -> tx_db::models::Task {
    tasks::create(
        pool,
        tasks::NewTaskInput {
            title,
            description: None,
            parent_id: None,
            score: 0,
            metadata: "{}",
        },
    )
    .await
    .expect("create should succeed")
}

async fn make_worker(pool: &sqlx::SqlitePool, name: &str) -> tx_db::models::Worker {
    workers::register(
        pool,
        workers::RegisterInput {
            name,
            hostname: "test-host",
            pid: std::process::id() as i64,
            capabilities: "{}",
        },
    )
    .await
    .expect("register should succeed")
}

#[tokio::test]
async fn only_one_of_two_concurrent_claims_on_the_same_task_succeeds() {
    let db = create_test_db().await;
    let task = make_task(&db.pool, "race me").await;
    let worker_a = make_worker(&db.pool, "worker-a").await;
    let worker_b = make_worker(&db.pool, "worker-b").await;

    let (r1, r2) = tokio::join!(
        claims::claim(&db.pool, &task.id, &worker_a.id, None),
        claims::claim(&db.pool, &task.id, &worker_b.id, None),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one claimant should win the race");

    let failure = if r1.is_err() { r1 } else { r2 };
    let err = failure.unwrap_err();
    assert_eq!(err.code(), "AlreadyClaimed");
}

#[tokio::test]
async fn concurrent_add_blocker_calls_never_close_a_cycle() {
    let db = create_test_db().await;
    let a = make_task(&db.pool, "a").await;
    let b = make_task(&db.pool, "b").await;
    let c = make_task(&db.pool, "c").await;

    // a blocks b, b blocks c (sequential setup).
    dependencies::add_blocker(&db.pool, &b.id, &a.id).await.unwrap();
    dependencies::add_blocker(&db.pool, &c.id, &b.id).await.unwrap();

    // Two competing attempts to close the cycle by having c block a;
    // both race the same reachability check, neither may succeed in
    // creating a cycle.
    let (r1, r2) = tokio::join!(
        dependencies::add_blocker(&db.pool, &a.id, &c.id),
        dependencies::add_blocker(&db.pool, &a.id, &c.id),
    );
    assert!(r1.is_err() || r2.is_err(), "at least one attempt must be rejected");
    for r in [r1, r2] {
        if let Err(e) = r {
            assert_eq!(e.code(), "CircularDependency");
        }
    }
}

#[tokio::test]
async fn claim_expiry_and_reconcile_frees_the_task() {
    let db = create_test_db().await;
    let task = make_task(&db.pool, "stalls").await;
    let worker = make_worker(&db.pool, "worker-a").await;

    // lease_minutes negative puts it in the past immediately.
    claims::claim(&db.pool, &task.id, &worker.id, Some(-1)).await.unwrap();

    let expired = claims::get_expired(&db.pool).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].task_id, task.id);

    orchestrator::start(&db.pool, std::process::id() as i64, orchestrator::StartOptions {
        worker_pool_size: 1,
        heartbeat_interval_seconds: 30,
        lease_duration_minutes: 30,
        reconcile_interval_seconds: 60,
    })
    .await
    .unwrap();

    let report = orchestrator::reconcile(&db.pool).await.unwrap();
    assert_eq!(report.expired_claims_released, 1);
    assert!(claims::get_active_claim(&db.pool, &task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn outbox_readers_each_advance_their_own_cursor() {
    let db = create_test_db().await;
    for i in 0..3 {
        outbox::send(
            &db.pool,
            outbox::SendInput {
                channel: "general",
                sender: "worker-a",
                content: &format!("message {i}"),
                correlation_id: None,
                task_id: None,
                metadata: "{}",
                ttl_seconds: None,
            },
        )
        .await
        .unwrap();
    }

    let from_start = outbox::inbox(
        &db.pool,
        outbox::InboxQuery {
            channel: "general",
            after_id: 0,
            limit: 50,
            sender: None,
            correlation_id: None,
            include_acked: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(from_start.len(), 3);

    let middle_id = from_start[0].id;
    let after_first = outbox::inbox(
        &db.pool,
        outbox::InboxQuery {
            channel: "general",
            after_id: middle_id,
            limit: 50,
            sender: None,
            correlation_id: None,
            include_acked: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(after_first.len(), 2);
    assert!(after_first.iter().all(|m| m.id > middle_id));
}

#[tokio::test]
async fn task_ready_flips_once_its_blocker_is_done() {
    let db = create_test_db().await;
    let blocker = make_task(&db.pool, "blocker").await;
    let blocked = make_task(&db.pool, "blocked").await;
    dependencies::add_blocker(&db.pool, &blocked.id, &blocker.id).await.unwrap();

    let view = tasks::get_with_deps(&db.pool, &blocked.id).await.unwrap();
    assert!(!view.is_ready, "blocked task should not be ready while blocker is open");

    tasks::update(
        &db.pool,
        &blocker.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Ready),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tasks::update(
        &db.pool,
        &blocker.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Active),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tasks::update(
        &db.pool,
        &blocker.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Done),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let view = tasks::get_with_deps(&db.pool, &blocked.id).await.unwrap();
    assert!(view.is_ready, "blocked task should become ready once its blocker is done");
}

struct FixedSummarizer;

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, tasks: &[Task]) -> TxResult<(String, String)> {
        let summary = format!("compacted {} tasks", tasks.len());
        let learnings_text = tasks.iter().map(|t| format!("- {}\n", t.title)).collect::<String>();
        Ok((summary, learnings_text))
    }
}

async fn make_done_task(pool: &sqlx::SqlitePool, title: &str) -> tx_db::models::Task {
    let task = make_task(pool, title).await;
    tasks::update(
        pool,
        &task.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Ready),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tasks::update(
        pool,
        &task.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Active),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tasks::update(
        pool,
        &task.id,
        tasks::TaskUpdate {
            status: Some(TaskStatus::Done),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn a_failed_learnings_file_write_aborts_compaction_before_any_row_is_deleted() {
    let db = create_test_db().await;
    let task = make_done_task(&db.pool, "long finished").await;
    let cutoff = Utc::now() + chrono::Duration::seconds(1);

    // A path inside a directory that doesn't exist can never be opened.
    let unwritable_path = "/nonexistent-dir-for-tx-test/learnings.md";
    let err = promotion::compact(
        &db.pool,
        &FixedSummarizer,
        promotion::CompactOptions {
            before: cutoff,
            output_file: Some(unwritable_path),
            dry_run: false,
            output_mode: promotion::OutputMode::Overwrite,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "ValidationError");

    // The task must still be present: the row delete never ran.
    let still_there = tasks::get(&db.pool, &task.id).await.unwrap();
    assert_eq!(still_there.id, task.id);
}

#[tokio::test]
async fn compaction_deletes_tasks_only_after_a_successful_learnings_file_write() {
    let db = create_test_db().await;
    let task = make_done_task(&db.pool, "long finished").await;
    let cutoff = Utc::now() + chrono::Duration::seconds(1);

    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("learnings.md");

    let report = promotion::compact(
        &db.pool,
        &FixedSummarizer,
        promotion::CompactOptions {
            before: cutoff,
            output_file: Some(output_path.to_str().unwrap()),
            dry_run: false,
            output_mode: promotion::OutputMode::Overwrite,
        },
    )
    .await
    .unwrap();
    assert_eq!(report.tasks_deleted, 1);

    let contents = std::fs::read_to_string(&output_path).unwrap();
    assert!(contents.contains("long finished"));

    let missing = tasks::get(&db.pool, &task.id).await;
    assert!(missing.is_err(), "compacted task should be gone");
}

#[tokio::test]
async fn reap_stalled_kills_the_process_and_frees_its_claim() {
    let db = create_test_db().await;
    let task = make_task(&db.pool, "long running agent").await;
    let worker = make_worker(&db.pool, "worker-a").await;
    claims::claim(&db.pool, &task.id, &worker.id, None).await.unwrap();

    let mut child = tokio::process::Command::new("sleep")
        .arg("60")
        .spawn()
        .expect("failed to spawn sleep");
    let pid = child.id().expect("child should have a pid") as i64;

    let run = runs::start(
        &db.pool,
        runs::NewRunInput {
            task_id: Some(&task.id),
            agent: "test-agent",
            pid: Some(pid),
            transcript_path: None,
            stderr_path: None,
            stdout_path: None,
            metadata: "{}",
        },
    )
    .await
    .unwrap();

    runs::heartbeat(
        &db.pool,
        &run.id,
        runs::HeartbeatInput {
            stdout_bytes: 0,
            stderr_bytes: 0,
            transcript_bytes: 0,
            activity_at: None,
        },
    )
    .await
    .unwrap();

    let reaped = runs::reap_stalled(
        &db.pool,
        runs::ReapOptions {
            transcript_idle_seconds: 0,
            heartbeat_lag_seconds: None,
            reset_task: true,
            dry_run: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].run_id, run.id);
    assert!(reaped[0].process_killed);

    let finished = runs::get(&db.pool, &run.id).await.unwrap();
    assert_eq!(finished.exit_code, Some(137));

    assert!(claims::get_active_claim(&db.pool, &task.id).await.unwrap().is_none());
    let reset = tasks::get(&db.pool, &task.id).await.unwrap();
    assert_eq!(reset.status, TaskStatus::Ready);

    // Give the kill signal time to land, then confirm the process is gone.
    let wait = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await;
    assert!(wait.is_ok(), "child process should have exited after being reaped");
}

#[tokio::test]
async fn reap_stalled_reports_no_kill_for_a_run_whose_process_already_exited() {
    let db = create_test_db().await;
    let task = make_task(&db.pool, "already finished agent").await;

    let mut child = tokio::process::Command::new("true")
        .spawn()
        .expect("failed to spawn true");
    let pid = child.id().expect("child should have a pid") as i64;
    child.wait().await.expect("child should exit immediately");

    let run = runs::start(
        &db.pool,
        runs::NewRunInput {
            task_id: Some(&task.id),
            agent: "test-agent",
            pid: Some(pid),
            transcript_path: None,
            stderr_path: None,
            stdout_path: None,
            metadata: "{}",
        },
    )
    .await
    .unwrap();

    runs::heartbeat(
        &db.pool,
        &run.id,
        runs::HeartbeatInput {
            stdout_bytes: 0,
            stderr_bytes: 0,
            transcript_bytes: 0,
            activity_at: None,
        },
    )
    .await
    .unwrap();

    let reaped = runs::reap_stalled(
        &db.pool,
        runs::ReapOptions {
            transcript_idle_seconds: 0,
            heartbeat_lag_seconds: None,
            reset_task: true,
            dry_run: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(reaped.len(), 1);
    assert!(
        !reaped[0].process_killed,
        "a pid that had already exited before reap_stalled ran should never be reported as killed"
    );
}

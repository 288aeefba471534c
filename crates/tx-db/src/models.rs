//! Row models and status enums for every entity in the store.
//!
//! Every enum follows the same shape: a `sqlx::Type` mapped to `TEXT` in
//! `snake_case`, a hand-written `Display`/`FromStr` pair, and a dedicated
//! parse-error type so callers get a typed error instead of a bare string
//! when a row contains an unexpected value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Planning,
    Ready,
    Active,
    Blocked,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Planning => "planning",
            TaskStatus::Ready => "ready",
            TaskStatus::Active => "active",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "planning" => Ok(TaskStatus::Planning),
            "ready" => Ok(TaskStatus::Ready),
            "active" => Ok(TaskStatus::Active),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatusParseError(String);

impl fmt::Display for WorkerStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid worker status: {:?}", self.0)
    }
}

impl std::error::Error for WorkerStatusParseError {}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WorkerStatus {
    type Err = WorkerStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkerStatus::Idle),
            "busy" => Ok(WorkerStatus::Busy),
            "offline" => Ok(WorkerStatus::Offline),
            other => Err(WorkerStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ClaimStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Released,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimStatusParseError(String);

impl fmt::Display for ClaimStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid claim status: {:?}", self.0)
    }
}

impl std::error::Error for ClaimStatusParseError {}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimStatus::Active => "active",
            ClaimStatus::Released => "released",
            ClaimStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ClaimStatus::Active),
            "released" => Ok(ClaimStatus::Released),
            "expired" => Ok(ClaimStatus::Expired),
            other => Err(ClaimStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// OrchestratorStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorStatusParseError(String);

impl fmt::Display for OrchestratorStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid orchestrator status: {:?}", self.0)
    }
}

impl std::error::Error for OrchestratorStatusParseError {}

impl fmt::Display for OrchestratorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchestratorStatus::Stopped => "stopped",
            OrchestratorStatus::Starting => "starting",
            OrchestratorStatus::Running => "running",
            OrchestratorStatus::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrchestratorStatus {
    type Err = OrchestratorStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(OrchestratorStatus::Stopped),
            "starting" => Ok(OrchestratorStatus::Starting),
            "running" => Ok(OrchestratorStatus::Running),
            "stopping" => Ok(OrchestratorStatus::Stopping),
            other => Err(OrchestratorStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatusParseError(String);

impl fmt::Display for RunStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run status: {:?}", self.0)
    }
}

impl std::error::Error for RunStatusParseError {}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RunStatus {
    type Err = RunStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(RunStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// AttemptOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcomeParseError(String);

impl fmt::Display for AttemptOutcomeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid attempt outcome: {:?}", self.0)
    }
}

impl std::error::Error for AttemptOutcomeParseError {}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AttemptOutcome {
    type Err = AttemptOutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(AttemptOutcome::Succeeded),
            "failed" => Ok(AttemptOutcome::Failed),
            other => Err(AttemptOutcomeParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceType (Learning provenance)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Compaction,
    Run,
    Manual,
    ClaudeMd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTypeParseError(String);

impl fmt::Display for SourceTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid source type: {:?}", self.0)
    }
}

impl std::error::Error for SourceTypeParseError {}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Compaction => "compaction",
            SourceType::Run => "run",
            SourceType::Manual => "manual",
            SourceType::ClaudeMd => "claude_md",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SourceType {
    type Err = SourceTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compaction" => Ok(SourceType::Compaction),
            "run" => Ok(SourceType::Run),
            "manual" => Ok(SourceType::Manual),
            "claude_md" => Ok(SourceType::ClaudeMd),
            other => Err(SourceTypeParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateConfidence / CandidateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CandidateConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateConfidenceParseError(String);

impl fmt::Display for CandidateConfidenceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid candidate confidence: {:?}", self.0)
    }
}

impl std::error::Error for CandidateConfidenceParseError {}

impl fmt::Display for CandidateConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateConfidence::Low => "low",
            CandidateConfidence::Medium => "medium",
            CandidateConfidence::High => "high",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CandidateConfidence {
    type Err = CandidateConfidenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CandidateConfidence::Low),
            "medium" => Ok(CandidateConfidence::Medium),
            "high" => Ok(CandidateConfidence::High),
            other => Err(CandidateConfidenceParseError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Promoted,
    Rejected,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStatusParseError(String);

impl fmt::Display for CandidateStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid candidate status: {:?}", self.0)
    }
}

impl std::error::Error for CandidateStatusParseError {}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Promoted => "promoted",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::Merged => "merged",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CandidateStatus {
    type Err = CandidateStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CandidateStatus::Pending),
            "promoted" => Ok(CandidateStatus::Promoted),
            "rejected" => Ok(CandidateStatus::Rejected),
            "merged" => Ok(CandidateStatus::Merged),
            other => Err(CandidateStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// AnchorStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Valid,
    Drifted,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorStatusParseError(String);

impl fmt::Display for AnchorStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid anchor status: {:?}", self.0)
    }
}

impl std::error::Error for AnchorStatusParseError {}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnchorStatus::Valid => "valid",
            AnchorStatus::Drifted => "drifted",
            AnchorStatus::Invalid => "invalid",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AnchorStatus {
    type Err = AnchorStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(AnchorStatus::Valid),
            "drifted" => Ok(AnchorStatus::Drifted),
            "invalid" => Ok(AnchorStatus::Invalid),
            other => Err(AnchorStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// OutboxMessageStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxMessageStatus {
    Pending,
    Acked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxMessageStatusParseError(String);

impl fmt::Display for OutboxMessageStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid outbox message status: {:?}", self.0)
    }
}

impl std::error::Error for OutboxMessageStatusParseError {}

impl fmt::Display for OutboxMessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutboxMessageStatus::Pending => "pending",
            OutboxMessageStatus::Acked => "acked",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OutboxMessageStatus {
    type Err = OutboxMessageStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxMessageStatus::Pending),
            "acked" => Ok(OutboxMessageStatus::Acked),
            other => Err(OutboxMessageStatusParseError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub parent_id: Option<String>,
    pub score: i64,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TaskDependency {
    pub blocker_id: String,
    pub blocked_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub pid: i64,
    pub status: WorkerStatus,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub current_task_id: Option<String>,
    pub capabilities: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub task_id: String,
    pub worker_id: String,
    pub status: ClaimStatus,
    pub claimed_at: DateTime<Utc>,
    pub lease_expires_at: DateTime<Utc>,
    pub renewed_count: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub id: i64,
    pub status: OrchestratorStatus,
    pub pid: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub worker_pool_size: i64,
    pub heartbeat_interval_seconds: i64,
    pub lease_duration_minutes: i64,
    pub reconcile_interval_seconds: i64,
    pub last_reconcile_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub task_id: Option<String>,
    pub agent: String,
    pub status: RunStatus,
    pub pid: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    pub transcript_path: Option<String>,
    pub stderr_path: Option<String>,
    pub stdout_path: Option<String>,
    pub error_message: Option<String>,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RunHeartbeat {
    pub run_id: String,
    pub last_check_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub stdout_bytes: i64,
    pub stderr_bytes: i64,
    pub transcript_bytes: i64,
    pub last_delta_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub task_id: String,
    pub approach: String,
    pub outcome: AttemptOutcome,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Learning {
    pub id: String,
    pub content: String,
    pub source_type: SourceType,
    pub source_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub keywords: String,
    pub category: Option<String>,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub outcome_score: Option<f64>,
    pub embedding: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    pub confidence: CandidateConfidence,
    pub status: CandidateStatus,
    pub source_run_id: Option<String>,
    pub source_task_id: Option<String>,
    pub category: Option<String>,
    pub keywords: String,
    pub created_at: DateTime<Utc>,
    pub merged_into_learning_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LearningAnchor {
    pub id: String,
    pub learning_id: String,
    pub anchor_type: String,
    pub file_path: String,
    pub symbol_fqname: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub content_hash: Option<String>,
    pub status: AnchorStatus,
    pub pinned: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LearningEdge {
    pub id: i64,
    pub from_learning_id: String,
    pub to_learning_id: String,
    pub edge_type: String,
    pub created_at: DateTime<Utc>,
}

/// Provenance record from a source task to a learning it produced.
/// Distinct from `LearningEdge`, which only ever links two learnings.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LearningProvenance {
    pub id: i64,
    pub learning_id: String,
    pub task_id: String,
    pub relation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OutboxMessage {
    pub id: i64,
    pub channel: String,
    pub sender: String,
    pub content: String,
    pub status: OutboxMessageStatus,
    pub correlation_id: Option<String>,
    pub task_id: Option<String>,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub acked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CompactionLogEntry {
    pub id: i64,
    pub ran_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub tasks_deleted: i64,
    pub output_file: Option<String>,
    pub summary: Option<String>,
}

/// One verification observation for an anchor. Append-only: `anchors::record_verification`
/// inserts a new row here on every call, never rewrites a prior one.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AnchorInvalidation {
    pub id: i64,
    pub anchor_id: String,
    pub status: String,
    pub verified_at: DateTime<Utc>,
}

/// An opaque UUID, used only to generate identifiers; never stored in its
/// raw form (row ids are opaque `tx-`/`worker-`-prefixed strings; see
/// `tx_core::ids`).
pub type RawId = Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! round_trip_test {
        ($name:ident, $ty:ty, $( $variant:expr ),+ $(,)?) => {
            #[test]
            fn $name() {
                for variant in [$( $variant ),+] {
                    let s = variant.to_string();
                    let parsed: $ty = s.parse().unwrap();
                    assert_eq!(parsed, variant);
                }
            }
        };
    }

    round_trip_test!(
        task_status_round_trip,
        TaskStatus,
        TaskStatus::Backlog,
        TaskStatus::Planning,
        TaskStatus::Ready,
        TaskStatus::Active,
        TaskStatus::Blocked,
        TaskStatus::Done,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    );

    round_trip_test!(
        worker_status_round_trip,
        WorkerStatus,
        WorkerStatus::Idle,
        WorkerStatus::Busy,
        WorkerStatus::Offline,
    );

    round_trip_test!(
        claim_status_round_trip,
        ClaimStatus,
        ClaimStatus::Active,
        ClaimStatus::Released,
        ClaimStatus::Expired,
    );

    round_trip_test!(
        orchestrator_status_round_trip,
        OrchestratorStatus,
        OrchestratorStatus::Stopped,
        OrchestratorStatus::Starting,
        OrchestratorStatus::Running,
        OrchestratorStatus::Stopping,
    );

    round_trip_test!(
        run_status_round_trip,
        RunStatus,
        RunStatus::Running,
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::Cancelled,
    );

    round_trip_test!(
        attempt_outcome_round_trip,
        AttemptOutcome,
        AttemptOutcome::Succeeded,
        AttemptOutcome::Failed,
    );

    round_trip_test!(
        source_type_round_trip,
        SourceType,
        SourceType::Compaction,
        SourceType::Run,
        SourceType::Manual,
        SourceType::ClaudeMd,
    );

    round_trip_test!(
        candidate_confidence_round_trip,
        CandidateConfidence,
        CandidateConfidence::Low,
        CandidateConfidence::Medium,
        CandidateConfidence::High,
    );

    round_trip_test!(
        candidate_status_round_trip,
        CandidateStatus,
        CandidateStatus::Pending,
        CandidateStatus::Promoted,
        CandidateStatus::Rejected,
        CandidateStatus::Merged,
    );

    round_trip_test!(
        anchor_status_round_trip,
        AnchorStatus,
        AnchorStatus::Valid,
        AnchorStatus::Drifted,
        AnchorStatus::Invalid,
    );

    round_trip_test!(
        outbox_message_status_round_trip,
        OutboxMessageStatus,
        OutboxMessageStatus::Pending,
        OutboxMessageStatus::Acked,
    );

    #[test]
    fn invalid_task_status_rejected() {
        assert!("not_a_status".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn invalid_claim_status_rejected() {
        assert!("nope".parse::<ClaimStatus>().is_err());
    }
}

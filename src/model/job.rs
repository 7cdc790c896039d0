//! Job types: rows read from the pipeline's job tables.
//!
//! These are observed, never owned. The backend's stage workers create and
//! mutate every row; this side only reads them.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job statuses after which the backend never touches the job again.
pub const TERMINAL_STATUSES: [&str; 2] = ["completed", "failed"];

/// A row of `content_jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: Option<String>,
    pub status: String,
    pub stage: Option<String>,
    pub priority: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Job {
    /// Whether the job has reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status.as_str())
    }

    /// `status:stage`, the key progress display diffs on.
    pub fn progress_key(&self) -> String {
        format!("{}:{}", self.status, self.stage.as_deref().unwrap_or(""))
    }
}

/// Where a single stage of a job stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,

    /// Anything the backend reports that this client doesn't know yet.
    #[serde(other)]
    Unknown,
}

/// A row of `content_job_stages`: one per (job, stage) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub status: StageStatus,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub max_attempts: u32,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

/// A row of `content_job_events`. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub metadata: Option<serde_json::Value>,
}

/// A row of `content_payloads`, selected without its opaque content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub stage: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One row of the `get_content_stage_backlog` RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub stage: String,
    pub ready_count: u64,
    pub inflight_count: u64,
}

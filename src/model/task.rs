//! Editorial task rows and the statuses the generation flow moves them through.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tasks waiting for HTML generation.
pub const READY_FOR_GENERATION: &str = "ready_for_generation";

/// Written back after a successful generation.
pub const HTML_GENERATED: &str = "html_generated";

/// Written back after a failed generation, alongside `message`.
pub const GENERATION_FAILED: &str = "generation_failed";

/// A row of the `tasks` table, restricted to what the generation flow reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub content_plan_outline_guid: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

/// How a task's status reads to someone waiting on generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskProgress {
    Waiting,
    Generated,
    Failed,
}

impl Task {
    pub fn progress(&self) -> TaskProgress {
        match self.status.as_deref() {
            Some(HTML_GENERATED | "completed") => TaskProgress::Generated,
            Some(GENERATION_FAILED | "failed") => TaskProgress::Failed,
            _ => TaskProgress::Waiting,
        }
    }
}

/// The patch written to a task once generation settles.
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdate {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskUpdate {
    pub fn generated() -> Self {
        Self {
            status: HTML_GENERATED,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: GENERATION_FAILED,
            message: Some(message.into()),
        }
    }
}

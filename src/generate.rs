//! Side-by-side HTML generation for content-plan tasks.
//!
//! One remote call does the work; everything here is about driving it: the
//! outline lookup, saving what comes back, retries, batches, the
//! fire-and-forget kickoff with a status watch, and draining the ready queue.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, eq};
use crate::batch::{self, BatchItem};
use crate::model::{
    READY_FOR_GENERATION, SideBySideReply, SideBySideRequest, Task, TaskProgress, TaskUpdate,
};
use crate::retry::{self, Exhausted, RetryPolicy};

pub const FUNCTION: &str = "generate-side-by-side";

/// Generation can take minutes; the client never waits longer than this.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);

/// Kickoff only waits long enough for the request to be accepted.
pub const KICKOFF_TIMEOUT: Duration = Duration::from_secs(10);

const TASKS: &str = "tasks";

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("generation failed: {error}")]
    Rejected { error: String },

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("task {0} has no content plan outline GUID")]
    NoOutline(Uuid),

    #[error("failed to write {}: {source}", path.display())]
    Artifact { path: PathBuf, source: io::Error },
}

// ── Single generation ──

/// Generate HTML for one task.
///
/// Only a 200 reply with `success: true` counts. `timeout` is capped at
/// [`MAX_TIMEOUT`].
pub fn generate(
    backend: &Backend,
    task_id: Uuid,
    outline_guid: Option<&str>,
    timeout: Duration,
) -> Result<SideBySideReply, GenerateError> {
    let request = SideBySideRequest {
        task_id,
        outline_guid: outline_guid.map(String::from),
    };
    let started = Instant::now();
    let reply: SideBySideReply = backend
        .call_function(FUNCTION, &request, timeout.min(MAX_TIMEOUT))?
        .accept(&[200])?
        .json()?;

    if !reply.success {
        return Err(GenerateError::Rejected {
            error: reply.error.unwrap_or_else(|| "unknown error".into()),
        });
    }
    info!(
        %task_id,
        html_bytes = reply.html_len(),
        schema = reply.schema.is_some(),
        elapsed_s = started.elapsed().as_secs(),
        "html generated"
    );
    Ok(reply)
}

/// [`generate`] under a retry budget.
pub fn generate_with_retry(
    backend: &Backend,
    task_id: Uuid,
    outline_guid: Option<&str>,
    timeout: Duration,
    policy: RetryPolicy,
) -> Result<SideBySideReply, Exhausted<GenerateError>> {
    retry::retry(policy, |attempt| {
        debug!(%task_id, attempt, "generation attempt");
        generate(backend, task_id, outline_guid, timeout)
    })
}

// ── Tasks ──

pub fn fetch_task(backend: &Backend, task_id: Uuid) -> Result<Option<Task>, BackendError> {
    let rows: Vec<Task> = backend.select(
        TASKS,
        &[("task_id", eq(task_id)), ("select", "*".into())],
    )?;
    Ok(rows.into_iter().next())
}

/// The outline GUID recorded on a task.
pub fn lookup_outline(backend: &Backend, task_id: Uuid) -> Result<String, GenerateError> {
    let task = fetch_task(backend, task_id)?.ok_or(GenerateError::TaskNotFound(task_id))?;
    task.content_plan_outline_guid
        .filter(|guid| !guid.trim().is_empty())
        .ok_or(GenerateError::NoOutline(task_id))
}

// ── Artifacts ──

/// Files written for one successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub html: Option<PathBuf>,
    pub schema: Option<PathBuf>,
}

pub fn html_path(dir: &Path, task_id: Uuid) -> PathBuf {
    dir.join(format!("output-{task_id}.html"))
}

pub fn schema_path(dir: &Path, task_id: Uuid) -> PathBuf {
    dir.join(format!("schema-{task_id}.json"))
}

/// Write the HTML and, when present, the pretty-printed schema into `dir`.
pub fn save_artifacts(
    reply: &SideBySideReply,
    task_id: Uuid,
    dir: &Path,
) -> Result<Artifacts, GenerateError> {
    let html = match &reply.html {
        Some(html) => {
            let path = html_path(dir, task_id);
            write(&path, html)?;
            Some(path)
        }
        None => None,
    };

    let schema = match &reply.schema {
        Some(schema) => {
            let path = schema_path(dir, task_id);
            let text = serde_json::to_string_pretty(schema).map_err(|e| GenerateError::Artifact {
                path: path.clone(),
                source: io::Error::other(e),
            })?;
            write(&path, &text)?;
            Some(path)
        }
        None => None,
    };

    Ok(Artifacts { html, schema })
}

fn write(path: &Path, contents: &str) -> Result<(), GenerateError> {
    fs::write(path, contents).map_err(|source| GenerateError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

// ── Kickoff ──

/// How a kickoff request ended.
#[derive(Debug)]
pub enum Kickoff {
    /// The function answered inside the kickoff window.
    Answered(SideBySideReply),
    /// The window closed first. The remote job may still be running.
    Detached,
}

/// Start generation without waiting for it. A timeout is not a failure.
pub fn kickoff(
    backend: &Backend,
    task_id: Uuid,
    outline_guid: Option<&str>,
    timeout: Duration,
) -> Result<Kickoff, GenerateError> {
    match generate(backend, task_id, outline_guid, timeout) {
        Ok(reply) => Ok(Kickoff::Answered(reply)),
        Err(GenerateError::Backend(e)) if e.is_timeout() => {
            info!(%task_id, "kickoff window closed; generation may still be running");
            Ok(Kickoff::Detached)
        }
        Err(e) => Err(e),
    }
}

/// Where a task ended up while being watched.
#[derive(Debug)]
pub enum TaskWait {
    Generated(Task),
    Failed(Task),
    TimedOut(Option<Task>),
}

/// Poll a task's status until it settles or `max_wait` elapses.
///
/// `on_status` sees every fetched row. Fetch errors are logged and the next
/// tick tries again.
pub fn wait_for_task(
    backend: &Backend,
    task_id: Uuid,
    interval: Duration,
    max_wait: Duration,
    mut on_status: impl FnMut(&Task),
) -> TaskWait {
    let started = Instant::now();
    let mut last = None;
    loop {
        match fetch_task(backend, task_id) {
            Ok(Some(task)) => {
                on_status(&task);
                match task.progress() {
                    TaskProgress::Generated => return TaskWait::Generated(task),
                    TaskProgress::Failed => return TaskWait::Failed(task),
                    TaskProgress::Waiting => last = Some(task),
                }
            }
            Ok(None) => debug!(%task_id, "task not visible yet"),
            Err(e) => warn!(%task_id, error = %e, "task status check failed"),
        }

        let elapsed = started.elapsed();
        if elapsed >= max_wait {
            return TaskWait::TimedOut(last);
        }
        thread::sleep(interval.min(max_wait - elapsed));
    }
}

// ── Pending queue ──

/// Tasks waiting for generation.
pub fn pending_tasks(backend: &Backend, limit: usize) -> Result<Vec<Task>, BackendError> {
    backend.select(
        TASKS,
        &[
            ("status", eq(READY_FOR_GENERATION)),
            ("select", "*".into()),
            ("limit", limit.to_string()),
        ],
    )
}

/// Generate every ready task, one at a time, and record each outcome on its row.
///
/// A failed status write is logged; it does not change the item's outcome.
pub fn process_pending(
    backend: &Backend,
    limit: usize,
    timeout: Duration,
    on_item: impl FnMut(usize, &BatchItem<SideBySideReply, GenerateError>),
) -> Result<Vec<BatchItem<SideBySideReply, GenerateError>>, GenerateError> {
    let tasks = pending_tasks(backend, limit)?;
    info!(count = tasks.len(), "pending tasks");

    let ids: Vec<Uuid> = tasks.iter().map(|t| t.task_id).collect();
    let items = batch::run_sequential(
        &ids,
        Duration::ZERO,
        |task_id| {
            let outline = tasks
                .iter()
                .find(|t| t.task_id == task_id)
                .and_then(|t| t.content_plan_outline_guid.as_deref());
            let outcome = generate(backend, task_id, outline, timeout);
            let update = match &outcome {
                Ok(_) => TaskUpdate::generated(),
                Err(e) => TaskUpdate::failed(e.to_string()),
            };
            if let Err(e) = backend.update(TASKS, &[("task_id", eq(task_id))], &update) {
                warn!(%task_id, error = %e, "could not record task status");
            }
            outcome
        },
        on_item,
    );
    Ok(items)
}

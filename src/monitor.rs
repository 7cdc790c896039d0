//! Job monitoring: read a job's remote state and follow it to completion.
//!
//! Purely observational. Each tick refetches the job row; stage rows and
//! events are fetched only when the job's `status:stage` changes, and once
//! more when the job reaches a terminal status. Display is last-write-wins.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, eq};
use crate::model::{BacklogEntry, Event, Job, PayloadRecord, StageRecord};

/// Events fetched per snapshot; the newest [`EVENTS_SHOWN`] of these are displayed.
pub const EVENT_FETCH_LIMIT: usize = 20;

pub const EVENTS_SHOWN: usize = 10;

/// Read access to a job's remote state.
pub trait JobSource {
    /// The job row, or `None` if no job has this ID.
    fn job(&self, id: Uuid) -> Result<Option<Job>, BackendError>;

    /// Stage rows, ordered by stage name.
    fn stages(&self, id: Uuid) -> Result<Vec<StageRecord>, BackendError>;

    /// The most recent events, newest first.
    fn recent_events(&self, id: Uuid, limit: usize) -> Result<Vec<Event>, BackendError>;
}

impl JobSource for Backend {
    fn job(&self, id: Uuid) -> Result<Option<Job>, BackendError> {
        let rows: Vec<Job> =
            self.select("content_jobs", &[("id", eq(id)), ("select", "*".into())])?;
        Ok(rows.into_iter().next())
    }

    fn stages(&self, id: Uuid) -> Result<Vec<StageRecord>, BackendError> {
        self.select(
            "content_job_stages",
            &[
                ("job_id", eq(id)),
                ("select", "*".into()),
                ("order", "stage".into()),
            ],
        )
    }

    fn recent_events(&self, id: Uuid, limit: usize) -> Result<Vec<Event>, BackendError> {
        self.select(
            "content_job_events",
            &[
                ("job_id", eq(id)),
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
                ("limit", limit.to_string()),
            ],
        )
    }
}

/// Stage payload timestamps, newest state of each stage's artifact.
pub fn payloads(backend: &Backend, id: Uuid) -> Result<Vec<PayloadRecord>, BackendError> {
    backend.select(
        "content_payloads",
        &[
            ("job_id", eq(id)),
            ("select", "stage,created_at,updated_at".into()),
            ("order", "stage".into()),
        ],
    )
}

/// Per-stage ready and in-flight counts across the whole pipeline.
pub fn backlog(backend: &Backend) -> Result<Vec<BacklogEntry>, BackendError> {
    backend.rpc("get_content_stage_backlog", &serde_json::json!({}))
}

/// A job with its stages and recent events.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub job: Job,
    pub stages: Vec<StageRecord>,
    /// Oldest first.
    pub events: Vec<Event>,
}

impl Snapshot {
    /// Fetch a full snapshot. `Ok(None)` if the job doesn't exist.
    pub fn fetch(source: &impl JobSource, id: Uuid) -> Result<Option<Self>, BackendError> {
        let Some(job) = source.job(id)? else {
            return Ok(None);
        };
        let stages = source.stages(id)?;
        let events = source.recent_events(id, EVENT_FETCH_LIMIT)?;
        Ok(Some(Self {
            job,
            stages,
            events: chronological(events),
        }))
    }

    /// Complete a snapshot around an already-fetched job row.
    ///
    /// Detail fetch failures are logged and leave the detail empty; the job row
    /// alone is enough to keep polling.
    fn around(source: &impl JobSource, job: Job) -> Self {
        let stages = source.stages(job.id).unwrap_or_else(|e| {
            warn!(job_id = %job.id, error = %e, "failed to fetch stages");
            Vec::new()
        });
        let events = source
            .recent_events(job.id, EVENT_FETCH_LIMIT)
            .unwrap_or_else(|e| {
                warn!(job_id = %job.id, error = %e, "failed to fetch events");
                Vec::new()
            });
        Self {
            job,
            stages,
            events: chronological(events),
        }
    }
}

/// Keep the newest [`EVENTS_SHOWN`] of a newest-first list, oldest first.
fn chronological(mut newest_first: Vec<Event>) -> Vec<Event> {
    newest_first.truncate(EVENTS_SHOWN);
    newest_first.reverse();
    newest_first
}

/// Polling cadence and limits.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_duration: Duration,
}

/// What polling reports to its caller.
#[derive(Debug)]
pub enum PollUpdate<'a> {
    /// The job's `status:stage` changed (or this is the first sighting).
    Progress(&'a Snapshot),

    /// The job reached `completed` or `failed`.
    Finished(&'a Snapshot),
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Terminal status reached. Carries the final job row.
    Finished(Job),

    /// The maximum duration elapsed first. Carries the last job row seen, if any.
    TimedOut(Option<Job>),
}

/// Follow a job until it finishes or `max_duration` elapses.
///
/// The job row is fetched at least once. A terminal status ends polling right
/// after the fetch that saw it, without sleeping. Fetch errors are logged and
/// retried on the next tick.
pub fn poll(
    source: &impl JobSource,
    id: Uuid,
    options: PollOptions,
    mut on_update: impl FnMut(PollUpdate<'_>),
) -> PollOutcome {
    let started = Instant::now();
    let mut last_key: Option<String> = None;
    let mut last_job: Option<Job> = None;

    loop {
        match source.job(id) {
            Ok(Some(job)) => {
                let key = job.progress_key();
                if job.is_terminal() {
                    let snapshot = Snapshot::around(source, job.clone());
                    on_update(PollUpdate::Finished(&snapshot));
                    return PollOutcome::Finished(job);
                }
                if last_key.as_deref() != Some(key.as_str()) {
                    let snapshot = Snapshot::around(source, job.clone());
                    on_update(PollUpdate::Progress(&snapshot));
                    last_key = Some(key);
                }
                last_job = Some(job);
            }
            Ok(None) => debug!(job_id = %id, "job not visible yet"),
            Err(e) => warn!(job_id = %id, error = %e, "failed to fetch job"),
        }

        let elapsed = started.elapsed();
        if elapsed >= options.max_duration {
            return PollOutcome::TimedOut(last_job);
        }
        thread::sleep(options.interval.min(options.max_duration - elapsed));
    }
}

//! Output formatting for CLI display.

use jiff::Timestamp;

use crate::model::{BacklogEntry, Event, Job, PayloadRecord, StageRecord, StageStatus};

pub(super) fn stage_marker(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Completed => "✓",
        StageStatus::Failed => "✗",
        StageStatus::Processing => "⟳",
        StageStatus::Queued => "…",
        StageStatus::Pending => "·",
        StageStatus::Unknown => "?",
    }
}

/// Second-resolution UTC, e.g. `2025-03-01 10:00:00`.
pub(super) fn format_time(ts: Timestamp) -> String {
    ts.strftime("%Y-%m-%d %H:%M:%S").to_string()
}

pub(super) fn format_job(job: &Job) -> String {
    let mut lines = vec![
        format!("Job {}", job.id),
        format!("  Type:     {}", job.job_type.as_deref().unwrap_or("-")),
        format!("  Status:   {}", job.status),
        format!("  Stage:    {}", job.stage.as_deref().unwrap_or("-")),
    ];
    if let Some(priority) = job.priority {
        lines.push(format!("  Priority: {priority}"));
    }
    lines.push(format!("  Created:  {}", format_time(job.created_at)));
    lines.push(format!("  Updated:  {}", format_time(job.updated_at)));
    lines.join("\n")
}

/// One stage row: marker, name, status, attempts, timing.
pub(super) fn format_stage(stage: &StageRecord) -> String {
    let status = serde_json::to_value(stage.status)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string());
    let mut line = format!(
        "  {} {:<10} {:<11} {}/{}",
        stage_marker(stage.status),
        stage.stage,
        status,
        stage.attempt_count,
        stage.max_attempts,
    );
    if let Some(started) = stage.started_at {
        line.push_str(&format!("  started {}", format_time(started)));
    }
    if let Some(finished) = stage.finished_at {
        line.push_str(&format!("  finished {}", format_time(finished)));
    }
    line
}

pub(super) fn format_event(event: &Event) -> String {
    let mut line = format!(
        "  {}  {}/{}",
        format_time(event.created_at),
        event.stage.as_deref().unwrap_or("-"),
        event.status.as_deref().unwrap_or("-"),
    );
    if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
        line.push_str("  ");
        line.push_str(message);
    }
    line
}

pub(super) fn format_payload(payload: &PayloadRecord) -> String {
    format!(
        "  {:<10} created {}  updated {}",
        payload.stage,
        format_time(payload.created_at),
        format_time(payload.updated_at),
    )
}

pub(super) fn format_backlog(entries: &[BacklogEntry]) -> String {
    if entries.is_empty() {
        return "No backlog".to_string();
    }
    let mut lines = vec![format!("  {:<10} {:>6} {:>9}", "stage", "ready", "in-flight")];
    lines.extend(entries.iter().map(|e| {
        format!(
            "  {:<10} {:>6} {:>9}",
            e.stage, e.ready_count, e.inflight_count
        )
    }));
    lines.join("\n")
}

/// The first `max` characters of `text`, with `…` when cut.
pub(super) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

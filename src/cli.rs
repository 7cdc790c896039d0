//! CLI interface for pipectl.
//!
//! Each subcommand drives one pipeline contract: arguments in, progress on
//! stdout, a nonzero exit on failure. Commands group as:
//!
//! - `submit`, `monitor`, `backlog`: content jobs.
//! - `generate`, `generate-batch`, `kickoff`, `generate-pending`: side-by-side HTML.
//! - `hero-image`, `schema`: the other generators.

mod format;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::backend::{Backend, excerpt};
use crate::batch::{self, BatchItem, Summary};
use crate::config::Config;
use crate::generate::{self, GenerateError, Kickoff, TaskWait};
use crate::model::{HeroPromptReply, JobRequest, SideBySideReply};
use crate::monitor::{self, PollOptions, PollOutcome, PollUpdate, Snapshot};
use crate::retry::RetryPolicy;
use crate::schema_stream::{self, Section, StreamEvent};
use crate::{hero, intake};

use format::{format_backlog, format_event, format_job, format_payload, format_stage, truncate};

/// Drive the content pipeline's remote functions and tables.
#[derive(Debug, Parser)]
#[command(name = "pipectl", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: from brief to article
  1. pipectl submit --requester-email me@example.com --title "Benefits of AI" \
       --keyword "ai content" --domain example.com --watch
     → prints the job ID and follows it until completed or failed
  2. pipectl monitor 123e4567-e89b-12d3-a456-426614174000
  3. pipectl generate <task-id> --lookup-outline --retries 3
     → writes output-<task-id>.html and schema-<task-id>.json

Configuration: SUPABASE_URL, SUPABASE_ANON_KEY, SUPABASE_SERVICE_ROLE_KEY
from the environment, ./.env, or ~/.pipectl/config.toml."#;

/// Seconds before following a freshly submitted job.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a content job to the intake function.
    ///
    /// Takes a full job description from `--file`, or builds one from flags.
    Submit {
        /// JSON file with `job_type`, `requester_email`, `payload`, `initial_stage`.
        #[arg(
            long,
            conflicts_with_all = [
                "requester_email",
                "title",
                "keyword",
                "primary_keyword",
                "domain",
                "audience",
                "tone",
                "content_type",
            ]
        )]
        file: Option<PathBuf>,

        #[arg(long, default_value = "article")]
        job_type: String,

        #[arg(long)]
        requester_email: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// Target keyword. Repeat for several; the first is the primary one
        /// unless `--primary-keyword` says otherwise.
        #[arg(long)]
        keyword: Vec<String>,

        #[arg(long)]
        primary_keyword: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        /// Who the piece is written for.
        #[arg(long)]
        audience: Option<String>,

        #[arg(long)]
        tone: Option<String>,

        /// e.g. "comprehensive guide".
        #[arg(long)]
        content_type: Option<String>,

        #[arg(long, default_value = "research")]
        initial_stage: String,

        /// Print the stage backlog before submitting.
        #[arg(long)]
        backlog: bool,

        /// Follow the job after submitting.
        #[arg(long)]
        watch: bool,

        /// Seconds between polls with `--watch`.
        #[arg(long, default_value_t = 10)]
        interval: u64,

        /// Give up watching after this many seconds.
        #[arg(long, default_value_t = 300)]
        max_duration: u64,
    },

    /// Show a job's status, stages, recent events, and payloads.
    Monitor {
        job_id: Uuid,

        /// Keep polling until the job completes or fails.
        #[arg(long)]
        follow: bool,

        /// Seconds between polls with `--follow`.
        #[arg(long, default_value_t = 10)]
        interval: u64,

        /// Give up following after this many seconds.
        #[arg(long, default_value_t = 300)]
        max_duration: u64,
    },

    /// Show per-stage ready and in-flight counts.
    Backlog,

    /// Generate side-by-side HTML for one task and save it.
    Generate {
        task_id: Uuid,

        /// Content plan outline GUID to generate from.
        #[arg(long, conflicts_with = "lookup_outline")]
        outline_guid: Option<String>,

        /// Read the outline GUID from the task row.
        #[arg(long)]
        lookup_outline: bool,

        /// Total attempts before giving up.
        #[arg(long, default_value_t = 1)]
        retries: u32,

        /// Seconds between attempts.
        #[arg(long, default_value_t = 5)]
        retry_delay: u64,

        /// Client-side timeout in seconds (at most 600).
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        /// Directory for `output-<task>.html` and `schema-<task>.json`.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Generate HTML for several tasks, sequentially or on a worker pool.
    GenerateBatch {
        #[arg(required = true)]
        task_ids: Vec<Uuid>,

        /// Run on a pool of this many workers instead of one at a time.
        #[arg(long, num_args = 0..=1, default_missing_value = "3")]
        parallel: Option<usize>,

        /// Seconds between items when sequential.
        #[arg(long, default_value_t = 2)]
        delay: u64,

        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },

    /// Start generation without waiting, then watch the task's status.
    Kickoff {
        task_id: Uuid,

        #[arg(long)]
        outline_guid: Option<String>,

        /// Seconds between status checks.
        #[arg(long, default_value_t = 10)]
        poll_interval: u64,

        /// Stop watching after this many seconds.
        #[arg(long, default_value_t = 300)]
        max_wait: u64,
    },

    /// Generate every task marked ready and record the outcome on each row.
    GeneratePending {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },

    /// Generate a hero image prompt, then the image, for an outline.
    HeroImage { outline_guid: String },

    /// Stream a schema.org document for a page and save it.
    Schema {
        /// Page to describe.
        url: String,

        #[arg(long, default_value = "test-schema-output.json")]
        out: PathBuf,
    },
}

/// Run a parsed command line, returning an error message on failure.
pub fn run(cli: Cli, config: &Config) -> Result<(), String> {
    let backend = Backend::from_config(config).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Submit {
            file,
            job_type,
            requester_email,
            title,
            keyword,
            primary_keyword,
            domain,
            audience,
            tone,
            content_type,
            initial_stage,
            backlog,
            watch,
            interval,
            max_duration,
        } => {
            // Intake only accepts the service-role key.
            config
                .require_service_role_key()
                .map_err(|e| e.to_string())?;
            let job = match file {
                Some(path) => read_job(&path)?,
                None => JobRequest {
                    job_type,
                    requester_email: requester_email
                        .ok_or("--requester-email is required without --file")?,
                    payload: brief(
                        &title.ok_or("--title is required without --file")?,
                        &keyword,
                        &Brief {
                            primary_keyword,
                            domain,
                            audience,
                            tone,
                            content_type,
                        },
                    ),
                    initial_stage,
                },
            };
            let watch = watch.then(|| poll_options(interval, max_duration));
            cmd_submit(&backend, &job, backlog, watch)
        }
        Command::Monitor {
            job_id,
            follow,
            interval,
            max_duration,
        } => {
            if follow {
                cmd_follow(&backend, job_id, poll_options(interval, max_duration))
            } else {
                cmd_monitor(&backend, job_id)
            }
        }
        Command::Backlog => cmd_backlog(&backend),
        Command::Generate {
            task_id,
            outline_guid,
            lookup_outline,
            retries,
            retry_delay,
            timeout,
            out_dir,
        } => {
            let outline_guid = if lookup_outline {
                let guid = generate::lookup_outline(&backend, task_id).map_err(|e| e.to_string())?;
                println!("Outline GUID: {guid}");
                Some(guid)
            } else {
                outline_guid
            };
            let policy = RetryPolicy {
                attempts: retries,
                delay: Duration::from_secs(retry_delay),
            };
            cmd_generate(
                &backend,
                task_id,
                outline_guid.as_deref(),
                policy,
                Duration::from_secs(timeout),
                &out_dir,
            )
        }
        Command::GenerateBatch {
            task_ids,
            parallel,
            delay,
            timeout,
        } => cmd_generate_batch(
            &backend,
            &task_ids,
            parallel,
            Duration::from_secs(delay),
            Duration::from_secs(timeout),
        ),
        Command::Kickoff {
            task_id,
            outline_guid,
            poll_interval,
            max_wait,
        } => cmd_kickoff(
            &backend,
            task_id,
            outline_guid.as_deref(),
            Duration::from_secs(poll_interval),
            Duration::from_secs(max_wait),
        ),
        Command::GeneratePending { limit, timeout } => {
            cmd_generate_pending(&backend, limit, Duration::from_secs(timeout))
        }
        Command::HeroImage { outline_guid } => cmd_hero_image(&backend, &outline_guid),
        Command::Schema { url, out } => cmd_schema(&backend, &url, &out),
    }
}

fn poll_options(interval: u64, max_duration: u64) -> PollOptions {
    PollOptions {
        interval: Duration::from_secs(interval),
        max_duration: Duration::from_secs(max_duration),
    }
}

// ── Jobs ──

/// Optional brief fields; only the ones given end up in the payload.
struct Brief {
    primary_keyword: Option<String>,
    domain: Option<String>,
    audience: Option<String>,
    tone: Option<String>,
    content_type: Option<String>,
}

/// Build the job payload from flags.
fn brief(title: &str, keywords: &[String], extra: &Brief) -> Value {
    let mut payload = Map::new();
    payload.insert("title".into(), title.into());
    if !keywords.is_empty() {
        payload.insert("keywords".into(), keywords.into());
    }
    let primary = extra.primary_keyword.as_ref().or(keywords.first());
    if let Some(primary) = primary {
        payload.insert("primary_keyword".into(), primary.as_str().into());
    }
    let fields = [
        ("domain", &extra.domain),
        ("target_audience", &extra.audience),
        ("tone", &extra.tone),
        ("content_type", &extra.content_type),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            payload.insert(key.into(), value.as_str().into());
        }
    }
    Value::Object(payload)
}

fn read_job(path: &Path) -> Result<JobRequest, String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid job file {}: {e}", path.display()))
}

fn cmd_submit(
    backend: &Backend,
    job: &JobRequest,
    show_backlog: bool,
    watch: Option<PollOptions>,
) -> Result<(), String> {
    if show_backlog {
        cmd_backlog(backend)?;
        println!();
    }

    if let Some(title) = job.payload.get("title").and_then(Value::as_str) {
        println!("Submitting: {title}");
    }
    let receipt = intake::submit(backend, job).map_err(|e| e.to_string())?;

    println!("{}", receipt.job_id);
    if let Some(status) = &receipt.status {
        println!("Status: {status}");
    }
    if let Some(stage) = &receipt.stage {
        println!("Stage: {stage}");
    }

    if let Some(options) = watch {
        thread::sleep(SETTLE_DELAY);
        cmd_follow(backend, receipt.job_id, options)?;
    }
    Ok(())
}

fn cmd_monitor(backend: &Backend, job_id: Uuid) -> Result<(), String> {
    let snapshot = Snapshot::fetch(backend, job_id)
        .map_err(|e| format!("failed to fetch job: {e}"))?
        .ok_or_else(|| format!("job {job_id} not found"))?;

    print_snapshot(&snapshot);

    match monitor::payloads(backend, job_id) {
        Ok(payloads) if !payloads.is_empty() => {
            println!("\nPayloads:");
            for payload in &payloads {
                println!("{}", format_payload(payload));
            }
        }
        Ok(_) => {}
        Err(e) => eprintln!("Could not fetch payloads: {e}"),
    }
    Ok(())
}

fn cmd_follow(backend: &Backend, job_id: Uuid, options: PollOptions) -> Result<(), String> {
    println!(
        "Following {job_id} every {}s (up to {}s)",
        options.interval.as_secs(),
        options.max_duration.as_secs()
    );

    let outcome = monitor::poll(backend, job_id, options, |update| {
        let (PollUpdate::Progress(snapshot) | PollUpdate::Finished(snapshot)) = update;
        println!();
        print_snapshot(snapshot);
    });

    match outcome {
        PollOutcome::Finished(job) if job.status == "completed" => {
            println!("\nJob completed");
            Ok(())
        }
        PollOutcome::Finished(job) => {
            Err(format!("job {} ended with status {}", job.id, job.status))
        }
        PollOutcome::TimedOut(last) => {
            let state = last.map_or_else(|| "never seen".to_string(), |j| j.progress_key());
            println!(
                "\nStopped following after {}s; last state {state}",
                options.max_duration.as_secs()
            );
            Ok(())
        }
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("{}", format_job(&snapshot.job));

    if !snapshot.stages.is_empty() {
        println!("\nStages:");
        for stage in &snapshot.stages {
            println!("{}", format_stage(stage));
        }
    }

    if !snapshot.events.is_empty() {
        println!("\nRecent events:");
        for event in &snapshot.events {
            println!("{}", format_event(event));
        }
    }
}

fn cmd_backlog(backend: &Backend) -> Result<(), String> {
    let entries = monitor::backlog(backend).map_err(|e| format!("failed to fetch backlog: {e}"))?;
    println!("{}", format_backlog(&entries));
    Ok(())
}

// ── Side-by-side generation ──

fn cmd_generate(
    backend: &Backend,
    task_id: Uuid,
    outline_guid: Option<&str>,
    policy: RetryPolicy,
    timeout: Duration,
    out_dir: &Path,
) -> Result<(), String> {
    println!("Generating HTML for task {task_id} (this can take several minutes)");
    let reply = generate::generate_with_retry(backend, task_id, outline_guid, timeout, policy)
        .map_err(|e| e.to_string())?;

    print_reply(&reply);
    let artifacts =
        generate::save_artifacts(&reply, task_id, out_dir).map_err(|e| e.to_string())?;
    if let Some(path) = &artifacts.html {
        eprintln!("Saved HTML → {}", path.display());
    }
    if let Some(path) = &artifacts.schema {
        eprintln!("Saved schema → {}", path.display());
    }
    Ok(())
}

fn print_reply(reply: &SideBySideReply) {
    println!("Status: {}", reply.status.as_deref().unwrap_or("-"));
    println!("HTML: {} bytes", reply.html_len());
    println!(
        "Schema: {}",
        if reply.schema_generated { "generated" } else { "not generated" }
    );
    if reply.generated_markdown == Some(false) {
        println!("Reused existing edited content");
    }
    if reply.generated_json == Some(false) {
        println!("Reused existing post JSON");
    }
}

fn cmd_generate_batch(
    backend: &Backend,
    task_ids: &[Uuid],
    parallel: Option<usize>,
    delay: Duration,
    timeout: Duration,
) -> Result<(), String> {
    let run = |task_id| generate::generate(backend, task_id, None, timeout);

    let items = match parallel {
        Some(workers) => {
            println!("Generating {} task(s) on {workers} worker(s)", task_ids.len());
            batch::run_parallel(task_ids, workers, run, print_item)
        }
        None => {
            println!("Generating {} task(s) one at a time", task_ids.len());
            batch::run_sequential(task_ids, delay, run, |index, item| {
                print!("[{}/{}] ", index + 1, task_ids.len());
                print_item(item);
            })
        }
    };

    report_summary(&items)
}

fn print_item(item: &BatchItem<SideBySideReply, GenerateError>) {
    match &item.outcome {
        Ok(reply) => println!("✓ {} ({} bytes)", item.task_id, reply.html_len()),
        Err(e) => println!("✗ {}: {e}", item.task_id),
    }
}

fn report_summary(items: &[BatchItem<SideBySideReply, GenerateError>]) -> Result<(), String> {
    let summary = Summary::of(items);
    println!(
        "\n{} succeeded, {} failed, {} total",
        summary.succeeded,
        summary.failed,
        summary.total()
    );
    if summary.failed > 0 {
        return Err(format!("{} of {} task(s) failed", summary.failed, summary.total()));
    }
    Ok(())
}

fn cmd_kickoff(
    backend: &Backend,
    task_id: Uuid,
    outline_guid: Option<&str>,
    interval: Duration,
    max_wait: Duration,
) -> Result<(), String> {
    match generate::kickoff(backend, task_id, outline_guid, generate::KICKOFF_TIMEOUT)
        .map_err(|e| e.to_string())?
    {
        Kickoff::Answered(reply) => {
            println!("Generation finished during kickoff");
            print_reply(&reply);
            return Ok(());
        }
        Kickoff::Detached => println!("Kickoff sent; the job may still be running"),
    }

    let mut last_status = None;
    let outcome = generate::wait_for_task(backend, task_id, interval, max_wait, |task| {
        if task.status != last_status {
            println!(
                "Task status: {}",
                task.status.as_deref().unwrap_or("unknown")
            );
            last_status.clone_from(&task.status);
        }
    });

    match outcome {
        TaskWait::Generated(_) => {
            println!("HTML generated");
            Ok(())
        }
        TaskWait::Failed(task) => Err(format!(
            "generation failed: {}",
            task.message.as_deref().unwrap_or("no message")
        )),
        TaskWait::TimedOut(_) => Err(format!(
            "task {task_id} still not generated after {}s",
            max_wait.as_secs()
        )),
    }
}

fn cmd_generate_pending(backend: &Backend, limit: usize, timeout: Duration) -> Result<(), String> {
    let items = generate::process_pending(backend, limit, timeout, |_, item| print_item(item))
        .map_err(|e| e.to_string())?;
    if items.is_empty() {
        println!("No tasks ready for generation");
        return Ok(());
    }
    report_summary(&items)
}

// ── Hero image and schema ──

fn cmd_hero_image(backend: &Backend, outline_guid: &str) -> Result<(), String> {
    println!("Step 1: generating hero image prompt");
    let result = hero::generate(backend, outline_guid, |prompt| {
        if let Some(source) = &prompt.content_source {
            println!("  Content source: {source}");
        }
        if let Some(id) = prompt.prompt_id() {
            println!("  Prompt ID: {id}");
        }
        println!("Step 2: generating hero image");
    });

    match result {
        Ok(image) => {
            if let Some(title) = &image.image.title {
                println!("Title: {title}");
            }
            println!("Image URL: {}", image.url().unwrap_or("(none returned)"));
            Ok(())
        }
        Err(hero::HeroError::Image { source, prompt }) => Err(format!(
            "step 2 (image) failed: {source}\nStep 1 result:\n{}",
            prompt_result(&prompt)
        )),
        Err(e) => Err(e.to_string()),
    }
}

/// Step 1's full reply as pretty JSON, cut to an excerpt.
fn prompt_result(prompt: &HeroPromptReply) -> String {
    serde_json::to_string_pretty(prompt)
        .map_or_else(|e| format!("(unprintable: {e})"), |json| excerpt(&json))
}

fn cmd_schema(backend: &Backend, url: &str, out: &Path) -> Result<(), String> {
    println!("Streaming schema for {url}");
    let mut body_bytes = 0;
    let on_event = |event: &StreamEvent| match event {
        StreamEvent::Enter(Section::Processing) => println!("[processing]"),
        StreamEvent::Enter(Section::Think) => println!("[thinking]"),
        StreamEvent::Line(_, text) => println!("  {text}"),
        StreamEvent::Exit(section) => println!("[/{section}]"),
        StreamEvent::Body(text) => body_bytes += text.len(),
    };
    let schema = schema_stream::fetch_schema(backend, url, schema_stream::TIMEOUT, on_event)
        .map_err(|e| e.to_string())?;

    println!("\nReceived {body_bytes} bytes of schema JSON");
    if let Some(kind) = schema.get("@type") {
        println!("@type: {kind}");
    }
    if let Some(name) = schema
        .get("headline")
        .or_else(|| schema.get("name"))
        .and_then(Value::as_str)
    {
        println!("Headline: {}", truncate(name, 60));
    }
    if let Some(fields) = schema.as_object() {
        println!("Fields: {}", fields.len());
    }

    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("failed to serialize schema: {e}"))?;
    fs::write(out, json).map_err(|e| format!("failed to write {}: {e}", out.display()))?;
    eprintln!("Saved schema → {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parallel_flag_defaults_to_three_workers() {
        let id = Uuid::new_v4().to_string();
        let cli =
            Cli::try_parse_from(["pipectl", "generate-batch", id.as_str(), "--parallel"]).unwrap();
        let Command::GenerateBatch { parallel, .. } = cli.command else {
            panic!("expected generate-batch");
        };
        assert_eq!(parallel, Some(batch::DEFAULT_WORKERS));
    }

    #[test]
    fn batch_without_parallel_is_sequential() {
        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["pipectl", "generate-batch", id.as_str()]).unwrap();
        let Command::GenerateBatch { parallel, delay, .. } = cli.command else {
            panic!("expected generate-batch");
        };
        assert_eq!(parallel, None);
        assert_eq!(delay, 2);
    }

    #[test]
    fn outline_flags_are_exclusive() {
        let id = Uuid::new_v4().to_string();
        let result = Cli::try_parse_from([
            "pipectl",
            "generate",
            id.as_str(),
            "--outline-guid",
            "x",
            "--lookup-outline",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn job_ids_must_be_uuids() {
        assert!(Cli::try_parse_from(["pipectl", "monitor", "not-a-uuid"]).is_err());
    }

    #[test]
    fn brief_includes_only_given_fields() {
        let payload = brief(
            "Benefits of AI",
            &["ai content".to_string(), "automation".to_string()],
            &Brief {
                primary_keyword: None,
                domain: Some("example.com".into()),
                audience: Some("marketers".into()),
                tone: None,
                content_type: None,
            },
        );
        assert_eq!(
            payload,
            json!({
                "title": "Benefits of AI",
                "keywords": ["ai content", "automation"],
                "primary_keyword": "ai content",
                "domain": "example.com",
                "target_audience": "marketers"
            })
        );
    }

    #[test]
    fn explicit_primary_keyword_wins() {
        let payload = brief(
            "T",
            &["first".to_string(), "second".to_string()],
            &Brief {
                primary_keyword: Some("second".into()),
                domain: None,
                audience: None,
                tone: None,
                content_type: None,
            },
        );
        assert_eq!(payload["primary_keyword"], "second");

        let bare = brief(
            "T",
            &[],
            &Brief {
                primary_keyword: None,
                domain: None,
                audience: None,
                tone: None,
                content_type: None,
            },
        );
        assert_eq!(bare, json!({ "title": "T" }));
    }

    #[test]
    fn job_file_excludes_brief_flags() {
        for flag in [
            "--keyword",
            "--primary-keyword",
            "--domain",
            "--audience",
            "--tone",
            "--content-type",
        ] {
            let result =
                Cli::try_parse_from(["pipectl", "submit", "--file", "job.json", flag, "x"]);
            assert!(result.is_err(), "{flag} accepted alongside --file");
        }
        assert!(Cli::try_parse_from(["pipectl", "submit", "--file", "job.json"]).is_ok());
    }

    #[test]
    fn help_parses_before_any_configuration() {
        let err = Cli::try_parse_from(["pipectl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn failed_image_step_prints_the_whole_prompt_reply() {
        let prompt: HeroPromptReply = serde_json::from_value(json!({
            "save_status": { "success": true, "hero_image_prompt_id": 7 },
            "prompt": "A clinician reviewing scans at dusk",
            "style": "photographic"
        }))
        .unwrap();
        let printed = prompt_result(&prompt);
        assert!(printed.contains("A clinician reviewing scans at dusk"));
        assert!(printed.contains("photographic"));
        assert!(printed.contains("hero_image_prompt_id"));

        let long: HeroPromptReply =
            serde_json::from_value(json!({ "prompt": "x".repeat(2_000) })).unwrap();
        assert_eq!(prompt_result(&long).chars().count(), crate::backend::EXCERPT_LEN);
    }

    #[test]
    fn reads_a_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{"job_type":"article","requester_email":"a@b.c","payload":{"title":"T"},"initial_stage":"research"}"#,
        )
        .unwrap();
        let job = read_job(&path).unwrap();
        assert_eq!(job.requester_email, "a@b.c");

        fs::write(&path, "{").unwrap();
        assert!(read_job(&path).unwrap_err().starts_with("invalid job file"));
    }
}

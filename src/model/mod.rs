//! Wire types for the content pipeline.
//!
//! Two families: rows read from the data store (jobs, stages, events,
//! payloads, tasks) and the bodies exchanged with remote functions.

mod function;
mod job;
mod task;

pub use function::{
    HeroImageReply, HeroImageRequest, HeroPromptReply, HeroPromptRequest, IntakeReceipt,
    JobRequest, SchemaRequest, SideBySideReply, SideBySideRequest,
};
pub use job::{BacklogEntry, Event, Job, PayloadRecord, StageRecord, StageStatus};
pub use task::{READY_FOR_GENERATION, Task, TaskProgress, TaskUpdate};

//! Job submission: hand a job description to `content-intake`.
//!
//! The function answers 200 or 202 depending on whether it queued the first
//! stage synchronously; both mean the job exists. No retry at this layer.

use std::time::Duration;

use tracing::info;

use crate::backend::{Backend, BackendError};
use crate::model::{IntakeReceipt, JobRequest};

pub const FUNCTION: &str = "content-intake";

pub const TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses `content-intake` uses for an accepted job.
const ACCEPTED: [u16; 2] = [200, 202];

#[derive(Debug, thiserror::Error)]
#[error("submission failed: {0}")]
pub struct IntakeError(#[from] pub BackendError);

/// Submit a job and return the receipt carrying its ID.
pub fn submit(backend: &Backend, job: &JobRequest) -> Result<IntakeReceipt, IntakeError> {
    let receipt: IntakeReceipt = backend
        .call_function(FUNCTION, job, TIMEOUT)?
        .accept(&ACCEPTED)?
        .json()?;
    info!(job_id = %receipt.job_id, job_type = %job.job_type, "job submitted");
    Ok(receipt)
}

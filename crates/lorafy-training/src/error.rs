use crate::identifier::InvalidIdentifier;
use crate::workflow::WorkflowStage;
use lorafy_abstraction::{JobId, JobStatus, RemoteError};
use std::time::Duration;
use thiserror::Error;

pub type NormalizationResult<T> = std::result::Result<T, NormalizationError>;
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("unreadable image '{entry}': {source}")]
    Image {
        entry: String,
        #[source]
        source: image::ImageError,
    },

    #[error("entry '{entry}' is larger than {limit} bytes uncompressed")]
    EntryTooLarge { entry: String, limit: u64 },

    #[error("archive is {size} bytes after {passes} passes, budget is {budget} bytes")]
    BudgetExceeded { size: u64, budget: u64, passes: u32 },

    #[error("invalid normalizer options: {0}")]
    InvalidOptions(String),

    #[error("normalization cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    #[error("invalid workflow configuration: {0}")]
    InvalidConfig(String),

    #[error("Uploading stage failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: WorkflowStage,
        #[source]
        source: RemoteError,
    },

    #[error(
        "training '{job_id}' did not finish within {attempts} polls ({elapsed:?}); last status: {last_status}"
    )]
    PollTimeout {
        job_id: JobId,
        attempts: u32,
        elapsed: Duration,
        last_status: JobStatus,
    },

    #[error(
        "workflow cancelled{}",
        .job_id.as_ref().map(|id| format!(" while training '{id}' was running")).unwrap_or_default()
    )]
    Cancelled { job_id: Option<JobId> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// The stage the workflow was in when it failed, if it got past validation.
    pub fn stage(&self) -> Option<WorkflowStage> {
        match self {
            Self::Normalization(_) => Some(WorkflowStage::Uploading),
            Self::Stage { stage, .. } => Some(*stage),
            Self::PollTimeout { .. } => Some(WorkflowStage::Polling),
            Self::InvalidIdentifier(_)
            | Self::InvalidConfig(_)
            | Self::Cancelled { .. }
            | Self::Internal(_) => None,
        }
    }

    /// The job that was submitted before the failure, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::PollTimeout { job_id, .. } => Some(job_id),
            Self::Cancelled { job_id } => job_id.as_ref(),
            _ => None,
        }
    }
}

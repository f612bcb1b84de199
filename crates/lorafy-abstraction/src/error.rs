use thiserror::Error;

/// An error returned by a remote training service.
///
/// Variants that come from an HTTP response keep the raw response body so the
/// caller can show it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The archive upload was rejected or returned no file URL.
    #[error("Upload failed (HTTP {status}): {body}")]
    UploadFailure {
        /// HTTP status of the upload response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The destination model could not be created.
    #[error("Destination model '{model}' could not be created (HTTP {status}): {body}")]
    DestinationCreationFailure {
        /// Destination in `owner/name` form.
        model: String,
        /// HTTP status of the create response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The training job was rejected.
    #[error("Failed to start training (HTTP {status}): {body}")]
    SubmissionFailure {
        /// HTTP status of the submission response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The service has no job with this ID.
    #[error("Training '{job_id}' not found: {body}")]
    JobNotFound {
        /// The job ID that was polled.
        job_id: String,
        /// Raw response body.
        body: String,
    },

    /// Polling returned an unexpected status other than not-found.
    #[error("Failed to fetch training '{job_id}' (HTTP {status}): {body}")]
    StatusFailure {
        /// The job ID that was polled.
        job_id: String,
        /// HTTP status of the poll response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The trained model's URL could not be resolved.
    #[error("Failed to fetch the link for '{model}' (HTTP {status}): {body}")]
    ResolutionFailure {
        /// Model in `owner/name` form.
        model: String,
        /// HTTP status of the lookup response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The service refused to cancel the job.
    #[error("Failed to cancel training '{job_id}' (HTTP {status}): {body}")]
    CancelFailure {
        /// The job ID that was cancelled.
        job_id: String,
        /// HTTP status of the cancel response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Transport Error: {0}")]
    Transport(String),

    /// A response body could not be parsed.
    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl RemoteError {
    /// Whether retrying the same request later could plausibly succeed.
    ///
    /// Only transport failures and 429/5xx poll responses qualify; a missing
    /// job or a rejected request never does.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::StatusFailure { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The raw remote response body, if this error came from a response.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::UploadFailure { body, .. }
            | Self::DestinationCreationFailure { body, .. }
            | Self::SubmissionFailure { body, .. }
            | Self::JobNotFound { body, .. }
            | Self::StatusFailure { body, .. }
            | Self::ResolutionFailure { body, .. }
            | Self::CancelFailure { body, .. } => Some(body),
            Self::Transport(_) | Self::Serialization(_) => None,
        }
    }
}

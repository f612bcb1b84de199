//! Service abstraction layer for Lorafy.
//!
//! This crate defines the types exchanged with a remote training service and
//! the `TrainingService` trait that concrete clients implement.

mod config;
mod error;
mod hyperparameters;
mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use config::{DEFAULT_BASE_URL, RemoteConfig};
pub use error::RemoteError;
pub use hyperparameters::{InvalidHyperparameters, TrainingHyperparameters};
pub use types::{
    DestinationCreation, DestinationSpec, JobId, JobStatus, ModelRef, ModelRefParseError,
    RemoteFileReference, TrainedModelLocation, TrainingInput, TrainingJob, TrainingRequest,
};

/// A remote service that accepts image archives and runs training jobs on them.
///
/// Every method is a single request/response round trip. Implementations hold
/// no per-job state; the job ID returned by `submit_training` is the only
/// handle a caller needs to carry.
///
/// All services must be `Send + Sync` so a workflow can run on any runtime thread.
#[async_trait]
pub trait TrainingService: Send + Sync {
    /// Uploads a ZIP archive and returns a URL the service can read it from.
    ///
    /// # Errors
    /// Returns `RemoteError::UploadFailure` on a non-success status or when the
    /// response carries no retrievable URL.
    async fn upload_archive(&self, archive: Bytes) -> Result<RemoteFileReference, RemoteError>;

    /// Creates the model resource a training job will write into.
    ///
    /// # Errors
    /// Returns `RemoteError::DestinationCreationFailure` for any status other
    /// than created or already-exists.
    async fn create_destination(
        &self,
        spec: &DestinationSpec,
    ) -> Result<DestinationCreation, RemoteError>;

    /// Submits a training job and returns its ID.
    ///
    /// # Errors
    /// Returns `RemoteError::SubmissionFailure` if the service rejects the job.
    async fn submit_training(&self, request: &TrainingRequest) -> Result<JobId, RemoteError>;

    /// Fetches the current state of a training job (one request, no waiting).
    ///
    /// # Errors
    /// Returns `RemoteError::JobNotFound` when the service does not know the job.
    async fn get_training(&self, job_id: &JobId) -> Result<TrainingJob, RemoteError>;

    /// Resolves the public URL of a trained model resource.
    ///
    /// # Errors
    /// Returns `RemoteError::ResolutionFailure` if the resource cannot be fetched.
    async fn resolve_model_url(&self, model: &ModelRef)
    -> Result<TrainedModelLocation, RemoteError>;

    /// Asks the service to stop a running job.
    ///
    /// # Errors
    /// Returns `RemoteError::CancelFailure` if the service refuses.
    async fn cancel_training(&self, job_id: &JobId) -> Result<(), RemoteError>;

    /// Returns a short identifier for the service (e.g. "replicate").
    fn service_id(&self) -> &str;
}

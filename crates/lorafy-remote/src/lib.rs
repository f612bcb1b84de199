//! Training service implementations for Lorafy.
//!
//! This crate provides concrete implementations of the `TrainingService` trait.
//!
//! # Supported Services
//!
//! - **Replicate**: hosted LoRA training (API token required)
//! - **Mock**: scripted responses for testing and dry runs

pub mod replicate;

use async_trait::async_trait;
use bytes::Bytes;
use lorafy_abstraction::{
    DestinationCreation, DestinationSpec, JobId, JobStatus, ModelRef, RemoteError,
    RemoteFileReference, TrainedModelLocation, TrainingJob, TrainingRequest, TrainingService,
};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub use replicate::ReplicateClient;

/// A call received by `MockTrainingService`, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Upload { size: usize },
    CreateDestination { model: String },
    Submit {
        destination: String,
        trigger_word: String,
        input_images: String,
    },
    Poll { job_id: String },
    Resolve { model: String },
    Cancel { job_id: String },
}

/// A scripted implementation of `TrainingService` for tests and dry runs.
///
/// Polls pop statuses from a queue; the last entry repeats once the queue is
/// down to one. Any operation can be primed to fail.
#[derive(Debug)]
pub struct MockTrainingService {
    id: String,
    polls: Mutex<VecDeque<Result<JobStatus, RemoteError>>>,
    failure_error: Option<String>,
    failure_logs: Option<String>,
    upload_failure: Option<RemoteError>,
    destination_result: Result<DestinationCreation, RemoteError>,
    submission_failure: Option<RemoteError>,
    resolution_failure: Option<RemoteError>,
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockTrainingService {
    fn default() -> Self {
        Self::new("mock".to_string())
    }
}

impl MockTrainingService {
    /// Creates a mock whose jobs succeed on the first poll.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self {
            id,
            polls: Mutex::new(VecDeque::from([Ok(JobStatus::Succeeded)])),
            failure_error: None,
            failure_logs: None,
            upload_failure: None,
            destination_result: Ok(DestinationCreation::Created),
            submission_failure: None,
            resolution_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the poll script with the given statuses.
    #[must_use]
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        *lock(&self.polls) = statuses.into_iter().map(Ok).collect();
        self
    }

    /// Appends a poll that fails with `error`.
    #[must_use]
    pub fn then_poll_error(self, error: RemoteError) -> Self {
        lock(&self.polls).push_back(Err(error));
        self
    }

    /// Appends a status to the poll script.
    #[must_use]
    pub fn then_status(self, status: JobStatus) -> Self {
        lock(&self.polls).push_back(Ok(status));
        self
    }

    /// Error text and logs reported with failed or canceled snapshots.
    #[must_use]
    pub fn with_failure_details(mut self, error: &str, logs: &str) -> Self {
        self.failure_error = Some(error.to_string());
        self.failure_logs = Some(logs.to_string());
        self
    }

    #[must_use]
    pub fn with_upload_failure(mut self, error: RemoteError) -> Self {
        self.upload_failure = Some(error);
        self
    }

    #[must_use]
    pub fn with_destination_result(
        mut self,
        result: Result<DestinationCreation, RemoteError>,
    ) -> Self {
        self.destination_result = result;
        self
    }

    #[must_use]
    pub fn with_submission_failure(mut self, error: RemoteError) -> Self {
        self.submission_failure = Some(error);
        self
    }

    #[must_use]
    pub fn with_resolution_failure(mut self, error: RemoteError) -> Self {
        self.resolution_failure = Some(error);
        self
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of status polls received so far.
    pub fn poll_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| matches!(c, MockCall::Poll { .. })).count()
    }

    fn record(&self, call: MockCall) {
        debug!(service_id = %self.id, call = ?call, "MockTrainingService received call");
        lock(&self.calls).push(call);
    }

    fn next_poll(&self) -> Result<JobStatus, RemoteError> {
        let mut polls = lock(&self.polls);
        if polls.len() > 1 {
            polls.pop_front().unwrap_or(Ok(JobStatus::Succeeded))
        } else {
            polls.front().cloned().unwrap_or(Ok(JobStatus::Succeeded))
        }
    }

    fn snapshot(&self, job_id: &JobId, status: JobStatus) -> TrainingJob {
        let (error, logs) = match status {
            JobStatus::Failed | JobStatus::Canceled => {
                (self.failure_error.clone(), self.failure_logs.clone())
            }
            _ => (None, None),
        };
        let raw = serde_json::json!({
            "id": job_id.0,
            "status": status,
            "error": error,
            "logs": logs,
        });
        TrainingJob {
            id: job_id.clone(),
            status,
            error,
            logs,
            destination: None,
            created_at: None,
            completed_at: None,
            raw,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TrainingService for MockTrainingService {
    async fn upload_archive(&self, archive: Bytes) -> Result<RemoteFileReference, RemoteError> {
        self.record(MockCall::Upload {
            size: archive.len(),
        });
        if let Some(err) = &self.upload_failure {
            return Err(err.clone());
        }
        Ok(RemoteFileReference(format!("mock://{}/files/data.zip", self.id)))
    }

    async fn create_destination(
        &self,
        spec: &DestinationSpec,
    ) -> Result<DestinationCreation, RemoteError> {
        self.record(MockCall::CreateDestination {
            model: spec.model.to_string(),
        });
        self.destination_result.clone()
    }

    async fn submit_training(&self, request: &TrainingRequest) -> Result<JobId, RemoteError> {
        self.record(MockCall::Submit {
            destination: request.destination.to_string(),
            trigger_word: request.input.trigger_word.clone(),
            input_images: request.input.input_images.clone(),
        });
        if let Some(err) = &self.submission_failure {
            return Err(err.clone());
        }
        Ok(JobId(format!("{}-training-1", self.id)))
    }

    async fn get_training(&self, job_id: &JobId) -> Result<TrainingJob, RemoteError> {
        self.record(MockCall::Poll {
            job_id: job_id.to_string(),
        });
        let status = self.next_poll()?;
        Ok(self.snapshot(job_id, status))
    }

    async fn resolve_model_url(
        &self,
        model: &ModelRef,
    ) -> Result<TrainedModelLocation, RemoteError> {
        self.record(MockCall::Resolve {
            model: model.to_string(),
        });
        if let Some(err) = &self.resolution_failure {
            return Err(err.clone());
        }
        Ok(TrainedModelLocation(format!("https://{}.invalid/{}", self.id, model)))
    }

    async fn cancel_training(&self, job_id: &JobId) -> Result<(), RemoteError> {
        self.record(MockCall::Cancel {
            job_id: job_id.to_string(),
        });
        Ok(())
    }

    fn service_id(&self) -> &str {
        &self.id
    }
}

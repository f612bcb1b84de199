//! Upload-and-train orchestration.
//!
//! `TrainingOrchestrator` drives one uploaded archive through
//! `Uploading -> Creating -> Submitting -> Polling -> Resolving` and reports
//! either the trained model's URL or the remote failure verbatim.

use crate::archive::{NormalizerOptions, UploadedArchive, normalize_with_cancel};
use crate::error::{WorkflowError, WorkflowResult};
use crate::identifier::TrainingJobIdentifier;
use crate::progress::{ProgressEvent, ProgressSink};
use lorafy_abstraction::{
    DestinationCreation, DestinationSpec, JobId, JobStatus, ModelRef, TrainedModelLocation,
    TrainingHyperparameters, TrainingInput, TrainingJob, TrainingRequest, TrainingService,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Uploading,
    Creating,
    Submitting,
    Polling,
    Resolving,
    Succeeded,
    Failed,
}

impl WorkflowStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "Uploading",
            Self::Creating => "Creating",
            Self::Submitting => "Submitting",
            Self::Polling => "Polling",
            Self::Resolving => "Resolving",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the destination model cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationFailurePolicy {
    /// Log and continue; submission fails loudly if the model is really missing.
    #[default]
    Ignore,
    /// Abort the workflow at the `Creating` stage.
    Propagate,
}

/// How long and how often to poll a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before the first poll.
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Give up after this many polls.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since polling began.
    pub deadline: Option<Duration>,
    /// Transient poll failures tolerated in a row before aborting.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            max_attempts: Some(480),
            deadline: Some(Duration::from_secs(4 * 60 * 60)),
            max_consecutive_errors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Account that owns destination models.
    pub owner: String,
    /// Appended to the training name to form the destination model name.
    pub destination_suffix: String,
    /// Destination description; `{name}` is replaced with the training name.
    pub description_template: String,
    pub visibility: String,
    pub hardware: String,
    pub creation_policy: CreationFailurePolicy,
    /// Ask the service to cancel the job when the workflow is cancelled.
    pub cancel_remote_on_abort: bool,
    pub hyperparameters: TrainingHyperparameters,
    pub normalizer: NormalizerOptions,
    pub poll: PollPolicy,
}

impl WorkflowConfig {
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            destination_suffix: "flux_lora".to_string(),
            description_template: "A model for {name}".to_string(),
            visibility: "public".to_string(),
            hardware: "gpu-l40s".to_string(),
            creation_policy: CreationFailurePolicy::default(),
            cancel_remote_on_abort: true,
            hyperparameters: TrainingHyperparameters::default(),
            normalizer: NormalizerOptions::default(),
            poll: PollPolicy::default(),
        }
    }

    pub fn validate(&self) -> WorkflowResult<()> {
        if self.owner.trim().is_empty() {
            return Err(WorkflowError::InvalidConfig("owner is required".to_string()));
        }
        if self.poll.interval.is_zero() && self.poll.max_attempts.is_none() {
            return Err(WorkflowError::InvalidConfig(
                "a zero poll interval needs max_attempts".to_string(),
            ));
        }
        self.hyperparameters
            .validate()
            .map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        self.normalizer.validate().map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    /// The destination model a training name writes into.
    pub fn destination_for(&self, identifier: &TrainingJobIdentifier) -> ModelRef {
        let name = identifier.destination_name(&self.destination_suffix);
        ModelRef::new(&self.owner, name)
    }
}

/// Terminal result of a workflow that got a job to a final state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Succeeded {
        job_id: JobId,
        identifier: TrainingJobIdentifier,
        destination: ModelRef,
        model_url: TrainedModelLocation,
    },
    /// The job failed or was canceled remotely; text is the service's own.
    Failed {
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
        logs: Option<String>,
    },
}

/// Runs training workflows against a `TrainingService`.
#[derive(Clone)]
pub struct TrainingOrchestrator {
    service: Arc<dyn TrainingService>,
    config: WorkflowConfig,
}

impl fmt::Debug for TrainingOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingOrchestrator")
            .field("service", &self.service.service_id())
            .field("config", &self.config)
            .finish()
    }
}

impl TrainingOrchestrator {
    pub fn new(service: Arc<dyn TrainingService>, config: WorkflowConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Runs the full upload-and-train workflow for one archive.
    ///
    /// Blocks (asynchronously) until the job is terminal, the poll policy is
    /// exhausted, or `cancel` fires.
    pub async fn run_training_workflow(
        &self,
        archive: UploadedArchive,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult<WorkflowOutcome> {
        self.config.validate()?;
        let identifier = TrainingJobIdentifier::from_filename(archive.filename())?;
        let destination = self.config.destination_for(&identifier);
        info!(
            filename = %archive.filename(),
            identifier = %identifier,
            destination = %destination,
            service = %self.service.service_id(),
            "Starting training workflow"
        );

        // Uploading
        progress.on_event(ProgressEvent::Stage {
            stage: WorkflowStage::Uploading,
        });
        let options = self.config.normalizer.clone();
        let blocking_cancel = cancel.clone();
        let normalized = cancellable(cancel, None, async move {
            tokio::task::spawn_blocking(move || {
                normalize_with_cancel(archive, &options, &blocking_cancel)
            })
            .await
        })
        .await?
        .map_err(|e| WorkflowError::Internal(format!("normalizer task failed: {}", e)))??;
        progress.on_event(ProgressEvent::Normalized {
            report: *normalized.report(),
        });

        let upload = self.service.upload_archive(normalized.into_bytes());
        let file = cancellable(cancel, None, upload)
            .await?
            .map_err(|source| WorkflowError::Stage {
                stage: WorkflowStage::Uploading,
                source,
            })?;
        progress.on_event(ProgressEvent::Uploaded {
            url: file.0.clone(),
        });

        // Creating
        progress.on_event(ProgressEvent::Stage {
            stage: WorkflowStage::Creating,
        });
        self.create_destination(&identifier, &destination, progress, cancel).await?;

        // Submitting
        progress.on_event(ProgressEvent::Stage {
            stage: WorkflowStage::Submitting,
        });
        let request = TrainingRequest {
            destination: destination.clone(),
            input: TrainingInput {
                input_images: file.0,
                trigger_word: identifier.to_string(),
                hyperparameters: self.config.hyperparameters.clone(),
            },
        };
        let job_id = cancellable(cancel, None, self.service.submit_training(&request))
            .await?
            .map_err(|source| WorkflowError::Stage {
                stage: WorkflowStage::Submitting,
                source,
            })?;
        progress.on_event(ProgressEvent::Submitted {
            job_id: job_id.clone(),
        });

        // Polling
        let job = match self.watch_job(&job_id, progress, cancel).await {
            Err(WorkflowError::Cancelled { job_id: Some(job_id) }) => {
                if self.config.cancel_remote_on_abort {
                    self.abort_remote(&job_id).await;
                }
                return Err(WorkflowError::Cancelled {
                    job_id: Some(job_id),
                });
            }
            other => other?,
        };

        if job.status == JobStatus::Succeeded {
            // Resolving
            progress.on_event(ProgressEvent::Stage {
                stage: WorkflowStage::Resolving,
            });
            let resolve = self.service.resolve_model_url(&destination);
            let model_url = cancellable(cancel, Some(&job_id), resolve)
                .await?
                .map_err(|source| WorkflowError::Stage {
                    stage: WorkflowStage::Resolving,
                    source,
                })?;
            progress.on_event(ProgressEvent::Stage {
                stage: WorkflowStage::Succeeded,
            });
            info!(job_id = %job_id, model_url = %model_url, "Training complete");
            Ok(WorkflowOutcome::Succeeded {
                job_id,
                identifier,
                destination,
                model_url,
            })
        } else {
            progress.on_event(ProgressEvent::Stage {
                stage: WorkflowStage::Failed,
            });
            warn!(
                job_id = %job_id,
                status = %job.status,
                error = job.error.as_deref().unwrap_or(""),
                "Training did not succeed"
            );
            Ok(WorkflowOutcome::Failed {
                job_id,
                status: job.status,
                error: job.error,
                logs: job.logs,
            })
        }
    }

    /// Polls an existing job until it is terminal, per the configured policy.
    ///
    /// Does not cancel the remote job when `cancel` fires.
    pub async fn watch_job(
        &self,
        job_id: &JobId,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult<TrainingJob> {
        let policy = &self.config.poll;
        progress.on_event(ProgressEvent::Stage {
            stage: WorkflowStage::Polling,
        });
        let started = Instant::now();

        sleep_or_cancel(policy.initial_delay, cancel, job_id).await?;

        let mut attempts: u32 = 0;
        let mut consecutive_errors: u32 = 0;
        let mut last_status = JobStatus::Starting;
        loop {
            let attempts_exhausted = policy.max_attempts.is_some_and(|max| attempts >= max);
            let deadline_passed = policy.deadline.is_some_and(|d| started.elapsed() >= d);
            if attempts_exhausted || deadline_passed {
                warn!(job_id = %job_id, attempts, "Polling gave up before the job finished");
                return Err(WorkflowError::PollTimeout {
                    job_id: job_id.clone(),
                    attempts,
                    elapsed: started.elapsed(),
                    last_status,
                });
            }

            attempts += 1;
            match cancellable(cancel, Some(job_id), self.service.get_training(job_id)).await? {
                Ok(job) => {
                    consecutive_errors = 0;
                    last_status = job.status;
                    progress.on_event(ProgressEvent::Polled {
                        job_id: job_id.clone(),
                        attempt: attempts,
                        status: job.status,
                    });
                    if job.status.is_terminal() {
                        progress.on_event(ProgressEvent::Finished {
                            job_id: job_id.clone(),
                            status: job.status,
                        });
                        return Ok(job);
                    }
                }
                Err(source)
                    if source.is_transient()
                        && consecutive_errors < policy.max_consecutive_errors =>
                {
                    consecutive_errors += 1;
                    warn!(
                        job_id = %job_id,
                        error = %source,
                        consecutive_errors,
                        "Poll failed; retrying"
                    );
                    progress.on_event(ProgressEvent::Warning {
                        stage: WorkflowStage::Polling,
                        message: source.to_string(),
                    });
                }
                Err(source) => {
                    return Err(WorkflowError::Stage {
                        stage: WorkflowStage::Polling,
                        source,
                    });
                }
            }

            // Never sleep past the deadline.
            let wait = policy.deadline.map_or(policy.interval, |deadline| {
                policy.interval.min(deadline.saturating_sub(started.elapsed()))
            });
            sleep_or_cancel(wait, cancel, job_id).await?;
        }
    }

    /// Fetches a job's current state once.
    pub async fn check_job(&self, job_id: &JobId) -> WorkflowResult<TrainingJob> {
        self.service
            .get_training(job_id)
            .await
            .map_err(|source| WorkflowError::Stage {
                stage: WorkflowStage::Polling,
                source,
            })
    }

    async fn create_destination(
        &self,
        identifier: &TrainingJobIdentifier,
        destination: &ModelRef,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult<()> {
        let spec = DestinationSpec {
            model: destination.clone(),
            description: self.config.description_template.replace("{name}", identifier.as_str()),
            visibility: self.config.visibility.clone(),
            hardware: self.config.hardware.clone(),
        };

        match cancellable(cancel, None, self.service.create_destination(&spec)).await? {
            Ok(creation) => {
                progress.on_event(ProgressEvent::DestinationReady {
                    model: destination.to_string(),
                    created: creation == DestinationCreation::Created,
                });
                Ok(())
            }
            Err(source) => match self.config.creation_policy {
                CreationFailurePolicy::Ignore => {
                    warn!(
                        model = %destination,
                        error = %source,
                        "Destination creation failed; continuing to submission"
                    );
                    progress.on_event(ProgressEvent::Warning {
                        stage: WorkflowStage::Creating,
                        message: source.to_string(),
                    });
                    Ok(())
                }
                CreationFailurePolicy::Propagate => Err(WorkflowError::Stage {
                    stage: WorkflowStage::Creating,
                    source,
                }),
            },
        }
    }

    async fn abort_remote(&self, job_id: &JobId) {
        match self.service.cancel_training(job_id).await {
            Ok(()) => info!(job_id = %job_id, "Remote training cancelled"),
            Err(e) => warn!(job_id = %job_id, error = %e, "Could not cancel remote training"),
        }
    }
}

/// Races `fut` against `cancel`.
async fn cancellable<T>(
    cancel: &CancellationToken,
    job_id: Option<&JobId>,
    fut: impl Future<Output = T>,
) -> WorkflowResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(WorkflowError::Cancelled {
            job_id: job_id.cloned(),
        }),
        out = fut => Ok(out),
    }
}

async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
    job_id: &JobId,
) -> WorkflowResult<()> {
    if duration.is_zero() {
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled {
                job_id: Some(job_id.clone()),
            });
        }
        return Ok(());
    }
    debug!(job_id = %job_id, ?duration, "Waiting before next poll");
    cancellable(cancel, Some(job_id), tokio::time::sleep(duration)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_and_serialize() {
        assert_eq!(WorkflowStage::Resolving.to_string(), "Resolving");
        assert_eq!(
            serde_json::to_value(WorkflowStage::Polling).unwrap(),
            "polling"
        );
    }

    #[test]
    fn test_default_config_matches_service_defaults() {
        let config = WorkflowConfig::new("acme");
        assert_eq!(config.hardware, "gpu-l40s");
        assert_eq!(config.visibility, "public");
        assert_eq!(config.creation_policy, CreationFailurePolicy::Ignore);
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        assert_eq!(config.poll.initial_delay, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_destination_for_identifier() {
        let config = WorkflowConfig::new("acme");
        let id = TrainingJobIdentifier::from_filename("batch1_JaneDoe.zip").unwrap();
        assert_eq!(
            config.destination_for(&id).to_string(),
            "acme/janedoe_flux_lora"
        );
    }

    #[test]
    fn test_validate_rejects_missing_owner() {
        let err = WorkflowConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_unbounded_busy_poll() {
        let mut config = WorkflowConfig::new("acme");
        config.poll.interval = Duration::ZERO;
        config.poll.max_attempts = None;
        assert!(config.validate().is_err());

        config.poll.max_attempts = Some(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_checks_hyperparameters() {
        let mut config = WorkflowConfig::new("acme");
        config.hyperparameters.steps = 0;
        assert!(matches!(config.validate(), Err(WorkflowError::InvalidConfig(_))));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = WorkflowOutcome::Failed {
            job_id: JobId("t1".to_string()),
            status: JobStatus::Failed,
            error: Some("NSFW content detected".to_string()),
            logs: None,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"], "NSFW content detected");
    }
}

use crate::archive::NormalizationReport;
use crate::workflow::WorkflowStage;
use lorafy_abstraction::{JobId, JobStatus};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stage { stage: WorkflowStage },
    Normalized { report: NormalizationReport },
    Uploaded { url: String },
    DestinationReady { model: String, created: bool },
    Warning {
        stage: WorkflowStage,
        message: String,
    },
    Submitted { job_id: JobId },
    Polled {
        job_id: JobId,
        attempt: u32,
        status: JobStatus,
    },
    Finished { job_id: JobId, status: JobStatus },
}

/// Receives workflow progress. The one piece of state a caller observes
/// while the workflow runs.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Writes every event to the tracing log.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { stage } => info!(%stage, "Stage started"),
            ProgressEvent::Normalized { report } => info!(
                original_size = report.original_size,
                normalized_size = report.normalized_size,
                images = report.images_reencoded,
                passes = report.passes,
                "Archive normalized"
            ),
            ProgressEvent::Uploaded { url } => info!(%url, "File uploaded"),
            ProgressEvent::DestinationReady { model, created } => {
                info!(%model, created, "Destination model ready");
            }
            ProgressEvent::Warning { stage, message } => warn!(%stage, "{message}"),
            ProgressEvent::Submitted { job_id } => info!(%job_id, "Training started"),
            ProgressEvent::Polled { job_id, attempt, status } => {
                info!(%job_id, attempt, %status, "Current status");
            }
            ProgressEvent::Finished { job_id, status } => {
                info!(%job_id, %status, "Training finished");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_tagged() {
        let event = ProgressEvent::Polled {
            job_id: JobId("abc".to_string()),
            attempt: 2,
            status: JobStatus::Processing,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "polled");
        assert_eq!(value["attempt"], 2);
        assert_eq!(value["status"], "processing");
    }
}

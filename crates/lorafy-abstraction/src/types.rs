use crate::hyperparameters::TrainingHyperparameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// URL of an uploaded archive. Owned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFileReference(pub String);

impl fmt::Display for RemoteFileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier of a remote training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolvable URL of a trained model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainedModelLocation(pub String);

impl fmt::Display for TrainedModelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A remote model resource, written `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
}

impl ModelRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected 'owner/name', got '{0}'")]
pub struct ModelRefParseError(pub String);

impl FromStr for ModelRef {
    type Err = ModelRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(ModelRefParseError(s.to_string())),
        }
    }
}

impl Serialize for ModelRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters for creating a destination model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSpec {
    pub model: ModelRef,
    pub description: String,
    /// "public" or "private".
    pub visibility: String,
    /// Hardware SKU the model runs on (e.g. "gpu-l40s").
    pub hardware: String,
}

/// Result of a destination creation request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationCreation {
    Created,
    AlreadyExists,
}

/// Inputs of a training job, serialized as the `input` object of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInput {
    /// URL of the uploaded image archive.
    pub input_images: String,
    /// Token the trained model associates with the subject.
    pub trigger_word: String,
    #[serde(flatten)]
    pub hyperparameters: TrainingHyperparameters,
}

/// A complete training submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub destination: ModelRef,
    pub input: TrainingInput,
}

/// Status of a remote training job. Transitions are owned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "queued")]
    Starting,
    Processing,
    Succeeded,
    Failed,
    #[serde(alias = "cancelled")]
    Canceled,
    /// Any status string this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether the job will not change state again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a training job as returned by one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Error text supplied by the service, verbatim.
    pub error: Option<String>,
    /// Training logs supplied by the service, verbatim.
    pub logs: Option<String>,
    /// Destination model in `owner/name` form, when reported.
    pub destination: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The full response payload.
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct TrainingJobWire {
    id: String,
    status: JobStatus,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    logs: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
}

impl TrainingJob {
    /// Builds a job snapshot from a raw poll response.
    ///
    /// `id` and `status` are required. An `error` that is not a string is kept
    /// as its JSON text; unparseable timestamps are dropped.
    pub fn from_payload(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let wire = TrainingJobWire::deserialize(&raw)?;
        let error = wire.error.and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(Self {
            id: JobId(wire.id),
            status: wire.status,
            error,
            logs: wire.logs,
            destination: wire.destination,
            created_at: wire.created_at.as_deref().and_then(parse_timestamp),
            completed_at: wire.completed_at.as_deref().and_then(parse_timestamp),
            raw,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}

//! Replicate training API client.
//!
//! This module implements `TrainingService` over the Replicate HTTP API:
//! the Files API for archive uploads, the Models API for destinations, and the
//! Trainings API for job submission, polling and cancellation.

use async_trait::async_trait;
use bytes::Bytes;
use lorafy_abstraction::{
    DestinationCreation, DestinationSpec, JobId, ModelRef, RemoteConfig, RemoteError,
    RemoteFileReference, TrainedModelLocation, TrainingJob, TrainingRequest, TrainingService,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// File name the archive is uploaded under.
const UPLOAD_FILE_NAME: &str = "data.zip";

/// Client for the Replicate training API.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    /// Connection settings, including the bearer token.
    config: RemoteConfig,
    /// HTTP client for making requests.
    client: Client,
}

impl ReplicateClient {
    /// Creates a new `ReplicateClient` from explicit configuration.
    ///
    /// # Errors
    /// Returns `RemoteError::Transport` if the HTTP client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn trainings_url(&self) -> String {
        self.url(&format!(
            "/models/{}/versions/{}/trainings",
            self.config.model_name, self.config.model_version
        ))
    }
}

/// Only 200 and 201 count as success for this API.
fn is_accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201)
}

fn transport_error(operation: &str, err: &reqwest::Error) -> RemoteError {
    error!(operation, error = %err, "Request to Replicate API failed");
    RemoteError::Transport(format!("Network error during {}: {}", operation, err))
}

async fn read_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    (status, body)
}

#[async_trait]
impl TrainingService for ReplicateClient {
    async fn upload_archive(&self, archive: Bytes) -> Result<RemoteFileReference, RemoteError> {
        let size = archive.len() as u64;
        debug!(size_bytes = size, "Uploading archive to Replicate Files API");

        let part = Part::stream_with_length(archive, size)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/zip")
            .map_err(|e| RemoteError::Transport(format!("Failed to set MIME type: {}", e)))?;
        let form = Form::new().part("content", part);

        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(&self.config.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("file upload", &e))?;

        let (status, body) = read_body(response).await;
        if !is_accepted(status) {
            error!(status = %status, body = %body, "Replicate rejected the archive upload");
            return Err(RemoteError::UploadFailure {
                status: status.as_u16(),
                body,
            });
        }

        let url = serde_json::from_str::<UploadResponse>(&body)
            .ok()
            .and_then(|r| r.urls)
            .and_then(|u| u.get)
            .ok_or_else(|| {
                error!(body = %body, "Upload response carries no file URL");
                RemoteError::UploadFailure {
                    status: status.as_u16(),
                    body: body.clone(),
                }
            })?;

        info!(url = %url, "Archive uploaded");
        Ok(RemoteFileReference(url))
    }

    async fn create_destination(
        &self,
        spec: &DestinationSpec,
    ) -> Result<DestinationCreation, RemoteError> {
        let request = CreateModelRequest {
            owner: &spec.model.owner,
            name: &spec.model.name,
            description: &spec.description,
            visibility: &spec.visibility,
            hardware: &spec.hardware,
        };

        let response = self
            .client
            .post(self.url("/models"))
            .bearer_auth(&self.config.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("model creation", &e))?;

        let (status, body) = read_body(response).await;
        info!(model = %spec.model, status = %status, "Destination model status");

        if is_accepted(status) {
            Ok(DestinationCreation::Created)
        } else if status == StatusCode::CONFLICT {
            Ok(DestinationCreation::AlreadyExists)
        } else {
            Err(RemoteError::DestinationCreationFailure {
                model: spec.model.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn submit_training(&self, request: &TrainingRequest) -> Result<JobId, RemoteError> {
        let url = self.trainings_url();
        debug!(
            url = %url,
            destination = %request.destination,
            trigger_word = %request.input.trigger_word,
            steps = request.input.hyperparameters.steps,
            "Submitting training job"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("training submission", &e))?;

        let (status, body) = read_body(response).await;
        if !is_accepted(status) {
            error!(status = %status, body = %body, "Replicate rejected the training job");
            return Err(RemoteError::SubmissionFailure {
                status: status.as_u16(),
                body,
            });
        }

        let id = serde_json::from_str::<SubmitResponse>(&body)
            .ok()
            .and_then(|r| r.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RemoteError::SubmissionFailure {
                status: status.as_u16(),
                body: body.clone(),
            })?;

        info!(job_id = %id, "Training started");
        Ok(JobId(id))
    }

    async fn get_training(&self, job_id: &JobId) -> Result<TrainingJob, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/trainings/{}", job_id)))
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| transport_error("training status", &e))?;

        let (status, body) = read_body(response).await;
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::JobNotFound {
                job_id: job_id.to_string(),
                body,
            });
        }
        if !status.is_success() {
            return Err(RemoteError::StatusFailure {
                job_id: job_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            RemoteError::Serialization(format!("Failed to parse training response: {}", e))
        })?;
        let job = TrainingJob::from_payload(payload).map_err(|e| {
            RemoteError::Serialization(format!("Unexpected training response: {}", e))
        })?;

        debug!(job_id = %job.id, status = %job.status, "Polled training");
        Ok(job)
    }

    async fn resolve_model_url(
        &self,
        model: &ModelRef,
    ) -> Result<TrainedModelLocation, RemoteError> {
        let url = self.url(&format!("/models/{}/{}", model.owner, model.name));
        debug!(url = %url, "Resolving model URL");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| transport_error("model lookup", &e))?;

        let (status, body) = read_body(response).await;
        if !is_accepted(status) {
            return Err(RemoteError::ResolutionFailure {
                model: model.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<ModelResponse>(&body)
            .ok()
            .and_then(|r| r.url)
            .map(TrainedModelLocation)
            .ok_or_else(|| RemoteError::ResolutionFailure {
                model: model.to_string(),
                status: status.as_u16(),
                body: body.clone(),
            })
    }

    async fn cancel_training(&self, job_id: &JobId) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/trainings/{}/cancel", job_id)))
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| transport_error("training cancellation", &e))?;

        let (status, body) = read_body(response).await;
        if !status.is_success() {
            warn!(job_id = %job_id, status = %status, "Replicate refused to cancel training");
            return Err(RemoteError::CancelFailure {
                job_id: job_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        info!(job_id = %job_id, "Training cancelled");
        Ok(())
    }

    fn service_id(&self) -> &str {
        "replicate"
    }
}

// Replicate API request/response structures

#[derive(Debug, Deserialize)]
struct UploadResponse {
    urls: Option<UploadUrls>,
}

#[derive(Debug, Deserialize)]
struct UploadUrls {
    get: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateModelRequest<'a> {
    owner: &'a str,
    name: &'a str,
    description: &'a str,
    visibility: &'a str,
    hardware: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReplicateClient {
        let config = RemoteConfig::new("t", "ostris/flux-dev-lora-trainer", "v1")
            .with_base_url("http://localhost:9/v1");
        ReplicateClient::new(config).unwrap()
    }

    #[test]
    fn test_trainings_url_uses_versioned_endpoint() {
        assert_eq!(
            client().trainings_url(),
            "http://localhost:9/v1/models/ostris/flux-dev-lora-trainer/versions/v1/trainings"
        );
    }

    #[test]
    fn test_only_200_and_201_are_accepted() {
        assert!(is_accepted(StatusCode::OK));
        assert!(is_accepted(StatusCode::CREATED));
        assert!(!is_accepted(StatusCode::ACCEPTED));
        assert!(!is_accepted(StatusCode::CONFLICT));
    }

    #[test]
    fn test_service_id() {
        assert_eq!(client().service_id(), "replicate");
    }
}

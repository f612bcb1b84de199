//! Integration tests for `ReplicateClient` against a mocked HTTP API.

use bytes::Bytes;
use lorafy_abstraction::{
    DestinationCreation, DestinationSpec, JobId, JobStatus, ModelRef, RemoteConfig, RemoteError,
    TrainingHyperparameters, TrainingInput, TrainingRequest, TrainingService,
};
use lorafy_remote::ReplicateClient;
use mockito::Matcher;
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> ReplicateClient {
    let config = RemoteConfig::new("test-token", "ostris/flux-dev-lora-trainer", "e440909d")
        .with_base_url(format!("{}/v1", server.url()));
    ReplicateClient::new(config).unwrap()
}

fn destination() -> ModelRef {
    ModelRef::new("micksil", "janedoe_flux_lora")
}

#[tokio::test]
async fn test_upload_archive_returns_get_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/files")
        .match_header("authorization", "Bearer test-token")
        .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
        .match_body(Matcher::Regex(r#"name="content"; filename="data.zip""#.to_string()))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "f1", "urls": {"get": "https://api.replicate.com/v1/files/f1"}}"#)
        .create_async()
        .await;

    let reference = client_for(&server)
        .upload_archive(Bytes::from_static(b"PK-archive"))
        .await
        .unwrap();

    assert_eq!(reference.0, "https://api.replicate.com/v1/files/f1");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_archive_server_error_carries_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/files")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let err = client_for(&server)
        .upload_archive(Bytes::from_static(b"PK"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::UploadFailure {
            status: 500,
            body: "upstream exploded".to_string(),
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_archive_missing_url_is_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/files")
        .with_status(200)
        .with_body(r#"{"id": "f1", "urls": {}}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .upload_archive(Bytes::from_static(b"PK"))
        .await
        .unwrap_err();

    match err {
        RemoteError::UploadFailure { status, body } => {
            assert_eq!(status, 200);
            assert!(body.contains("\"urls\""));
        }
        other => panic!("Expected UploadFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_destination_statuses() {
    let mut server = mockito::Server::new_async().await;
    let spec = DestinationSpec {
        model: destination(),
        description: "A model for janedoe".to_string(),
        visibility: "public".to_string(),
        hardware: "gpu-l40s".to_string(),
    };

    let created = server
        .mock("POST", "/v1/models")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::Json(json!({
            "owner": "micksil",
            "name": "janedoe_flux_lora",
            "description": "A model for janedoe",
            "visibility": "public",
            "hardware": "gpu-l40s"
        })))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let client = client_for(&server);
    assert_eq!(
        client.create_destination(&spec).await.unwrap(),
        DestinationCreation::Created
    );
    created.assert_async().await;
    created.remove_async().await;

    let conflict = server
        .mock("POST", "/v1/models")
        .with_status(409)
        .with_body(r#"{"detail": "A model with that name already exists"}"#)
        .create_async()
        .await;
    assert_eq!(
        client.create_destination(&spec).await.unwrap(),
        DestinationCreation::AlreadyExists
    );
    conflict.remove_async().await;

    let _denied = server
        .mock("POST", "/v1/models")
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;
    let err = client.create_destination(&spec).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::DestinationCreationFailure {
            model: "micksil/janedoe_flux_lora".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        }
    );
}

#[tokio::test]
async fn test_submit_training_posts_versioned_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/models/ostris/flux-dev-lora-trainer/versions/e440909d/trainings")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({
            "destination": "micksil/janedoe_flux_lora",
            "input": {
                "input_images": "https://files.example/data.zip",
                "trigger_word": "janedoe",
                "steps": 1000,
                "lora_rank": 16,
                "optimizer": "adamw8bit",
                "batch_size": 1,
                "resolution": "512,768,1024",
                "cache_latents_to_disk": false,
                "gradient_checkpointing": false
            }
        })))
        .with_status(201)
        .with_body(r#"{"id": "zz4ibbonubfz7carwiefibzgga", "status": "starting"}"#)
        .create_async()
        .await;

    let request = TrainingRequest {
        destination: destination(),
        input: TrainingInput {
            input_images: "https://files.example/data.zip".to_string(),
            trigger_word: "janedoe".to_string(),
            hyperparameters: TrainingHyperparameters::default(),
        },
    };

    let job_id = client_for(&server).submit_training(&request).await.unwrap();
    assert_eq!(job_id, JobId("zz4ibbonubfz7carwiefibzgga".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_submit_training_rejection_carries_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", Matcher::Regex("/trainings$".to_string()))
        .with_status(422)
        .with_body(r#"{"detail": "destination does not exist"}"#)
        .create_async()
        .await;

    let request = TrainingRequest {
        destination: destination(),
        input: TrainingInput {
            input_images: "u".to_string(),
            trigger_word: "janedoe".to_string(),
            hyperparameters: TrainingHyperparameters::default(),
        },
    };

    let err = client_for(&server).submit_training(&request).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::SubmissionFailure {
            status: 422,
            body: r#"{"detail": "destination does not exist"}"#.to_string(),
        }
    );
}

#[tokio::test]
async fn test_get_training_parses_payload() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/trainings/abc")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(
            r#"{"id": "abc", "status": "failed", "error": "NSFW content detected", "logs": "loading...", "output": null}"#,
        )
        .create_async()
        .await;

    let job = client_for(&server).get_training(&JobId("abc".to_string())).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("NSFW content detected"));
    assert_eq!(job.logs.as_deref(), Some("loading..."));
    assert!(job.raw.get("output").is_some());
}

#[tokio::test]
async fn test_get_training_not_found() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/trainings/missing")
        .with_status(404)
        .with_body(r#"{"detail": "Not found."}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .get_training(&JobId("missing".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::JobNotFound { ref job_id, .. } if job_id == "missing"
    ));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_get_training_server_error_is_transient() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/trainings/abc")
        .with_status(503)
        .with_body("try later")
        .create_async()
        .await;

    let err = client_for(&server).get_training(&JobId("abc".to_string())).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.body(), Some("try later"));
}

#[tokio::test]
async fn test_resolve_model_url() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/models/micksil/janedoe_flux_lora")
        .with_status(200)
        .with_body(r#"{"url": "https://replicate.com/micksil/janedoe_flux_lora", "owner": "micksil"}"#)
        .create_async()
        .await;

    let location = client_for(&server).resolve_model_url(&destination()).await.unwrap();
    assert_eq!(
        location.0,
        "https://replicate.com/micksil/janedoe_flux_lora"
    );
}

#[tokio::test]
async fn test_resolve_model_url_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/models/micksil/janedoe_flux_lora")
        .with_status(404)
        .with_body("no such model")
        .create_async()
        .await;

    let err = client_for(&server).resolve_model_url(&destination()).await.unwrap_err();
    assert!(matches!(err, RemoteError::ResolutionFailure { status: 404, .. }));
}

#[tokio::test]
async fn test_cancel_training() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/trainings/abc/cancel")
        .with_status(200)
        .with_body(r#"{"id": "abc", "status": "canceled"}"#)
        .create_async()
        .await;

    client_for(&server).cancel_training(&JobId("abc".to_string())).await.unwrap();
    mock.assert_async().await;
}

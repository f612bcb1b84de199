//! Archive normalization and training orchestration for Lorafy.
//!
//! Takes an uploaded ZIP of training images, brings it within the upload size
//! budget, and drives it through a `TrainingService`:
//!
//! 1. **Uploading**: normalize the archive and upload it
//! 2. **Creating**: create the destination model (already-existing is fine)
//! 3. **Submitting**: start the training job
//! 4. **Polling**: wait for a terminal status within the poll policy
//! 5. **Resolving**: look up the trained model's URL
//!
//! # Example
//!
//! ```rust,ignore
//! use lorafy_training::{TracingProgressSink, TrainingOrchestrator, UploadedArchive, WorkflowConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = TrainingOrchestrator::new(service, WorkflowConfig::new("acme"));
//! let archive = UploadedArchive::new(bytes, "batch1_janedoe.zip");
//! let outcome = orchestrator
//!     .run_training_workflow(archive, &TracingProgressSink, &CancellationToken::new())
//!     .await?;
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod identifier;
pub mod progress;
pub mod workflow;

pub use archive::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_ENTRY_SIZE, DEFAULT_SIZE_BUDGET,
    MAX_DIMENSION_LIMIT, NormalizationReport, NormalizedArchive, NormalizerOptions,
    UploadedArchive, is_image_entry, normalize, normalize_with_cancel,
};
pub use config::{ConfigError, ConfigResult, LorafyConfig};
pub use error::{NormalizationError, NormalizationResult, WorkflowError, WorkflowResult};
pub use identifier::{InvalidIdentifier, TrainingJobIdentifier, extract_identifier};
pub use progress::{NoopProgressSink, ProgressEvent, ProgressSink, TracingProgressSink};
pub use workflow::{
    CreationFailurePolicy, PollPolicy, TrainingOrchestrator, WorkflowConfig, WorkflowOutcome,
    WorkflowStage,
};

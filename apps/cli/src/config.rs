//! CLI configuration loading and service construction.

use anyhow::{Context, Result};
use lorafy_abstraction::TrainingService;
use lorafy_remote::ReplicateClient;
use lorafy_training::{LorafyConfig, TrainingOrchestrator};
use std::path::Path;
use std::sync::Arc;

/// Load and merge CLI configuration.
///
/// Configuration precedence:
/// 1. Environment variables
/// 2. Explicit `--config` file
/// 3. Local config file (./.lorafyrc)
/// 4. Global config file (~/.lorafy/config.toml)
/// 5. Defaults
pub fn load_config(explicit: Option<&Path>) -> Result<LorafyConfig> {
    LorafyConfig::discover_and_load(explicit).context("Failed to load configuration")
}

/// Builds the hosted training client from the effective configuration.
pub fn remote_service(config: &LorafyConfig) -> Result<Arc<dyn TrainingService>> {
    let remote = config.remote_config()?;
    let client = ReplicateClient::new(remote).context("Failed to create training client")?;
    Ok(Arc::new(client))
}

/// Builds an orchestrator against the hosted training service.
pub fn orchestrator(config: &LorafyConfig) -> Result<TrainingOrchestrator> {
    let service = remote_service(config)?;
    let workflow = config.workflow_config()?;
    Ok(TrainingOrchestrator::new(service, workflow))
}

//! Layered configuration file support.
//!
//! Settings come from, in increasing precedence: the global file
//! (`~/.lorafy/config.toml`), the local file (`./.lorafyrc`), an explicit
//! `--config` file, then environment variables.

use crate::archive::NormalizerOptions;
use crate::workflow::{CreationFailurePolicy, PollPolicy, WorkflowConfig};
use lorafy_abstraction::{DEFAULT_BASE_URL, RemoteConfig, TrainingHyperparameters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_TOKEN: &str = "REPLICATE_API_TOKEN";
pub const ENV_MODEL_NAME: &str = "LORAFY_MODEL_NAME";
pub const ENV_MODEL_VERSION: &str = "LORAFY_MODEL_VERSION";
pub const ENV_OWNER: &str = "LORAFY_OWNER";
pub const ENV_BASE_URL: &str = "LORAFY_BASE_URL";

const REDACTED: &str = "***";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// A required setting has no value in any layer.
    #[error("Missing required setting '{key}' (set it in the config file or via {env})")]
    Missing {
        key: &'static str,
        env: &'static str,
    },

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[remote]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_policy: Option<CreationFailurePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_remote_on_abort: Option<bool>,
}

/// `[polling]` section. Zero `max_attempts` or `deadline_secs` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub deadline_secs: u64,
    pub max_consecutive_errors: u32,
}

impl Default for PollingSection {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            initial_delay_secs: policy.initial_delay.as_secs(),
            interval_secs: policy.interval.as_secs(),
            max_attempts: policy.max_attempts.unwrap_or(0),
            deadline_secs: policy.deadline.map_or(0, |d| d.as_secs()),
            max_consecutive_errors: policy.max_consecutive_errors,
        }
    }
}

impl PollingSection {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            deadline: (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs)),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LorafyConfig {
    pub remote: RemoteSection,
    pub workflow: WorkflowSection,
    pub polling: PollingSection,
    pub normalizer: NormalizerOptions,
    pub hyperparameters: TrainingHyperparameters,
}

impl LorafyConfig {
    /// Get default global configuration file path.
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".lorafy").join("config.toml"))
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".lorafyrc")
    }

    /// Discovers and loads every layer, then applies environment overrides.
    ///
    /// The global and local files are optional; an explicit path must exist.
    pub fn discover_and_load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let global = Self::default_global_path();
        let local = Self::default_local_path();
        let mut config = Self::load_layers(global.as_deref(), Some(&local), explicit)?;
        config.apply_env();
        Ok(config)
    }

    /// Loads and merges the given layers without touching the environment.
    pub fn load_layers(
        global: Option<&Path>,
        local: Option<&Path>,
        explicit: Option<&Path>,
    ) -> ConfigResult<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in [global, local].into_iter().flatten() {
            if path.exists() {
                merge_values(&mut merged, read_layer(path)?);
            }
        }
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            merge_values(&mut merged, read_layer(path)?);
        }

        merged.try_into::<Self>().map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration from a single TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        Self::load_layers(None, None, Some(path))
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overrides settings from `lookup`; empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_API_TOKEN) {
            self.remote.api_token = Some(token);
        }
        if let Some(name) = get(ENV_MODEL_NAME) {
            self.remote.model_name = Some(name);
        }
        if let Some(version) = get(ENV_MODEL_VERSION) {
            self.remote.model_version = Some(version);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.remote.base_url = Some(url);
        }
        if let Some(owner) = get(ENV_OWNER) {
            self.workflow.owner = Some(owner);
        }
    }

    pub fn remote_config(&self) -> ConfigResult<RemoteConfig> {
        let remote = &self.remote;
        let api_token = required(remote.api_token.as_ref(), "remote.api_token", ENV_API_TOKEN)?;
        let model_name = required(
            remote.model_name.as_ref(),
            "remote.model_name",
            ENV_MODEL_NAME,
        )?;
        let model_version = required(
            remote.model_version.as_ref(),
            "remote.model_version",
            ENV_MODEL_VERSION,
        )?;

        let mut config = RemoteConfig::new(api_token, model_name, model_version)
            .with_base_url(remote.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        if let Some(secs) = remote.request_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "remote.request_timeout_secs must be > 0".to_string(),
                ));
            }
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn workflow_config(&self) -> ConfigResult<WorkflowConfig> {
        let owner = required(self.workflow.owner.as_ref(), "workflow.owner", ENV_OWNER)?;
        let mut config = WorkflowConfig::new(owner);
        let section = &self.workflow;
        if let Some(suffix) = &section.destination_suffix {
            config.destination_suffix.clone_from(suffix);
        }
        if let Some(template) = &section.description_template {
            config.description_template.clone_from(template);
        }
        if let Some(visibility) = &section.visibility {
            config.visibility.clone_from(visibility);
        }
        if let Some(hardware) = &section.hardware {
            config.hardware.clone_from(hardware);
        }
        if let Some(policy) = section.creation_policy {
            config.creation_policy = policy;
        }
        if let Some(cancel) = section.cancel_remote_on_abort {
            config.cancel_remote_on_abort = cancel;
        }
        config.hyperparameters = self.hyperparameters.clone();
        config.normalizer = self.normalizer.clone();
        config.poll = self.polling.policy();

        config.validate().map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(config)
    }

    /// A copy safe to print: the API token is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.remote.api_token.is_some() {
            copy.remote.api_token = Some(REDACTED.to_string());
        }
        copy
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))
    }
}

fn required(value: Option<&String>, key: &'static str, env: &'static str) -> ConfigResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or(ConfigError::Missing { key, env })
}

fn read_layer(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Tables merge key by key; any other value in `overlay` replaces the base.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

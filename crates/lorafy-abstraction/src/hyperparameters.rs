use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hyperparameters: {0}")]
pub struct InvalidHyperparameters(pub String);

/// Fixed LoRA training settings sent alongside every job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingHyperparameters {
    pub steps: u32,
    pub lora_rank: u32,
    pub optimizer: String,
    pub batch_size: u32,
    /// Comma-separated resolution ladder, e.g. "512,768,1024".
    pub resolution: String,
    pub learning_rate: f64,
    pub caption_dropout_rate: f64,
    pub cache_latents_to_disk: bool,
    pub gradient_checkpointing: bool,
    pub autocaption: bool,
}

impl Default for TrainingHyperparameters {
    fn default() -> Self {
        Self {
            steps: 1000,
            lora_rank: 16,
            optimizer: "adamw8bit".to_string(),
            batch_size: 1,
            resolution: "512,768,1024".to_string(),
            learning_rate: 0.0004,
            caption_dropout_rate: 0.05,
            cache_latents_to_disk: false,
            gradient_checkpointing: false,
            autocaption: true,
        }
    }
}

impl TrainingHyperparameters {
    pub fn validate(&self) -> Result<(), InvalidHyperparameters> {
        let invalid = |msg: &str| Err(InvalidHyperparameters(msg.to_string()));

        if self.steps == 0 {
            return invalid("steps must be >= 1");
        }
        if self.lora_rank == 0 {
            return invalid("lora_rank must be >= 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be >= 1");
        }
        if self.optimizer.trim().is_empty() {
            return invalid("optimizer is required");
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return invalid("learning_rate must be > 0");
        }
        if !(0.0..=1.0).contains(&self.caption_dropout_rate) {
            return invalid("caption_dropout_rate must be within [0, 1]");
        }
        self.resolutions()?;
        Ok(())
    }

    /// Parses the resolution ladder into pixel sizes.
    pub fn resolutions(&self) -> Result<Vec<u32>, InvalidHyperparameters> {
        if self.resolution.trim().is_empty() {
            return Err(InvalidHyperparameters("resolution is required".to_string()));
        }
        self.resolution
            .split(',')
            .map(|step| match step.trim().parse::<u32>() {
                Ok(px) if px > 0 => Ok(px),
                _ => Err(InvalidHyperparameters(format!(
                    "resolution entry '{}' is not a positive integer",
                    step.trim()
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = TrainingHyperparameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.resolutions().unwrap(), vec![512, 768, 1024]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut params = TrainingHyperparameters {
            steps: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        params = TrainingHyperparameters {
            learning_rate: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        params = TrainingHyperparameters {
            caption_dropout_rate: 1.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        params = TrainingHyperparameters {
            resolution: "512,,1024".to_string(),
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("resolution entry"));
    }

    #[test]
    fn test_partial_payload_uses_defaults() {
        let params: TrainingHyperparameters = serde_json::from_str(r#"{"steps": 1500}"#).unwrap();
        assert_eq!(params.steps, 1500);
        assert_eq!(params.lora_rank, 16);
    }
}

//! Training name extraction from uploaded file names.
//!
//! Uploads are expected to be named `<anything>_<token>.zip`; the token becomes
//! the trigger word and the stem of the destination model name.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid training name '{token}' from '{filename}': {reason}")]
pub struct InvalidIdentifier {
    pub filename: String,
    pub token: String,
    pub reason: String,
}

/// Derives the raw training token from an upload's file name.
///
/// Strips a trailing `.zip` (case-sensitive), keeps the text after the last
/// `_`, and lower-cases it. The result may be empty (`prefix_.zip`); use
/// `TrainingJobIdentifier::from_filename` to reject that.
pub fn extract_identifier(filename: &str) -> String {
    let stem = filename.strip_suffix(".zip").unwrap_or(filename);
    stem.rsplit('_').next().unwrap_or(stem).to_lowercase()
}

/// A validated training token, safe to use in model names and URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrainingJobIdentifier(String);

impl TrainingJobIdentifier {
    /// Extracts and validates the token of an uploaded file name.
    pub fn from_filename(filename: &str) -> Result<Self, InvalidIdentifier> {
        Self::validate(filename, extract_identifier(filename))
    }

    /// Validates an already-extracted token.
    pub fn parse(token: &str) -> Result<Self, InvalidIdentifier> {
        Self::validate(token, token.to_string())
    }

    fn validate(filename: &str, token: String) -> Result<Self, InvalidIdentifier> {
        let reject = |token: String, reason: String| InvalidIdentifier {
            filename: filename.to_string(),
            token,
            reason,
        };

        if token.is_empty() {
            return Err(reject(token, "name is empty".to_string()));
        }
        if let Some(bad) = token
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.')))
        {
            return Err(reject(token, format!("character '{bad}' is not allowed")));
        }
        if !token.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(reject(token, "name must start with a letter or digit".to_string()));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the destination model, `{token}_{suffix}`.
    pub fn destination_name(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.0.clone()
        } else {
            format!("{}_{}", self.0, suffix)
        }
    }
}

impl fmt::Display for TrainingJobIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrainingJobIdentifier {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrainingJobIdentifier> for String {
    fn from(value: TrainingJobIdentifier) -> Self {
        value.0
    }
}

//! Local archive normalization.

use crate::progress::mib;
use anyhow::{Context, Result};
use colored::Colorize;
use lorafy_training::{LorafyConfig, UploadedArchive, normalize};
use std::path::Path;

const MIB: u64 = 1024 * 1024;

/// Execute the normalize command.
///
/// Applies the same size budget as `train` and writes the result to `output`.
pub async fn execute(
    settings: &LorafyConfig,
    path: &Path,
    output: &Path,
    budget_mib: Option<u64>,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read archive {}", path.display()))?;
    let filename = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let mut options = settings.normalizer.clone();
    if let Some(budget) = budget_mib {
        options.size_budget = budget.saturating_mul(MIB);
    }

    let archive = UploadedArchive::new(bytes, filename);
    let normalized = tokio::task::spawn_blocking(move || normalize(archive, &options))
        .await
        .context("Normalizer task failed")??;

    tokio::fs::write(output, normalized.bytes())
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let report = normalized.report();
    if normalized.was_rebuilt() {
        println!(
            "{} Re-encoded {} of {} entries in {} pass(es): {:.1} MiB -> {:.1} MiB",
            "✓".green(),
            report.images_reencoded,
            report.entries,
            report.passes,
            mib(report.original_size),
            mib(report.normalized_size)
        );
    } else {
        println!(
            "{} Archive is within budget ({:.1} MiB); copied unchanged",
            "✓".green(),
            mib(report.original_size)
        );
    }
    println!("  Output: {}", output.display().to_string().cyan());
    Ok(())
}

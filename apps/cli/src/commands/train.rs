//! Training command implementation.

use crate::commands::cancel_on_ctrl_c;
use crate::config;
use crate::progress::SpinnerProgressSink;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use lorafy_abstraction::JobStatus;
use lorafy_remote::MockTrainingService;
use lorafy_training::{
    LorafyConfig, PollPolicy, TrainingOrchestrator, UploadedArchive, WorkflowOutcome,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DRY_RUN_OWNER: &str = "dry-run";

/// Execute the train command.
///
/// Runs the full workflow for one archive and prints the trained model URL,
/// or the service's failure message and logs.
pub async fn execute(
    settings: &LorafyConfig,
    path: &Path,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid archive path: {}", path.display()))?;
    if !filename.ends_with(".zip") {
        bail!("Expected a .zip archive, got '{}'", filename);
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read archive {}", path.display()))?;
    let archive = UploadedArchive::new(bytes, filename);

    let orchestrator = if dry_run {
        dry_run_orchestrator(settings)?
    } else {
        config::orchestrator(settings)?
    };

    let sink = if json_output {
        SpinnerProgressSink::hidden()
    } else {
        SpinnerProgressSink::new()
    };
    let cancel = cancel_on_ctrl_c();
    let result = orchestrator.run_training_workflow(archive, &sink, &cancel).await;
    sink.finish();
    let outcome = result?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        WorkflowOutcome::Succeeded { job_id, destination, model_url, .. } => {
            if !json_output {
                println!();
                println!("{}", "Training succeeded".bold().green());
                println!("  Job: {}", job_id.0.cyan());
                println!("  Model: {}", destination.to_string().cyan());
                println!("  URL: {}", model_url.0);
                println!();
            }
            Ok(())
        }
        WorkflowOutcome::Failed { job_id, status, error, logs } => {
            if !json_output {
                println!();
                println!("{}", format!("Training {}", status).bold().red());
                println!("  Job: {}", job_id.0.cyan());
                if let Some(error) = &error {
                    println!("  Error: {}", error);
                }
                if let Some(logs) = &logs {
                    println!();
                    println!("{}", "Logs:".bold());
                    println!("{}", logs.trim_end());
                }
                println!();
            }
            bail!(
                "Training {} {}: {}",
                job_id,
                status,
                error.as_deref().unwrap_or("no error reported")
            )
        }
    }
}

/// An orchestrator backed by a simulated service that succeeds after a few polls.
fn dry_run_orchestrator(settings: &LorafyConfig) -> Result<TrainingOrchestrator> {
    let mut settings = settings.clone();
    settings.workflow.owner.get_or_insert_with(|| DRY_RUN_OWNER.to_string());

    let mut workflow = settings.workflow_config()?;
    workflow.poll = PollPolicy {
        initial_delay: Duration::ZERO,
        interval: Duration::from_millis(100),
        max_attempts: Some(10),
        deadline: None,
        max_consecutive_errors: 0,
    };

    let service = MockTrainingService::new(DRY_RUN_OWNER.to_string())
        .with_statuses([JobStatus::Starting, JobStatus::Processing])
        .then_status(JobStatus::Succeeded);
    Ok(TrainingOrchestrator::new(Arc::new(service), workflow))
}

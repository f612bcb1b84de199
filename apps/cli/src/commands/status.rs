//! Job inspection commands: status, watch and cancel.

use crate::commands::cancel_on_ctrl_c;
use crate::config;
use crate::progress::SpinnerProgressSink;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use lorafy_abstraction::{JobId, JobStatus, TrainingJob};
use lorafy_training::{LorafyConfig, TrainingOrchestrator, WorkflowConfig};

/// Execute the status command.
pub async fn status(settings: &LorafyConfig, job_id: String, json_output: bool) -> Result<()> {
    let service = config::remote_service(settings)?;
    let job = service
        .get_training(&JobId(job_id))
        .await
        .context("Failed to fetch training status")?;
    print_job(&job, json_output)
}

/// Execute the watch command.
///
/// Polls with the configured policy until the job is terminal.
pub async fn watch(settings: &LorafyConfig, job_id: String, json_output: bool) -> Result<()> {
    let service = config::remote_service(settings)?;
    let mut workflow = WorkflowConfig::new(settings.workflow.owner.clone().unwrap_or_default());
    workflow.poll = settings.polling.policy();
    let orchestrator = TrainingOrchestrator::new(service, workflow);

    let sink = if json_output {
        SpinnerProgressSink::hidden()
    } else {
        SpinnerProgressSink::new()
    };
    let cancel = cancel_on_ctrl_c();
    let result = orchestrator.watch_job(&JobId(job_id), &sink, &cancel).await;
    sink.finish();
    let job = result?;

    print_job(&job, json_output)?;
    if job.status != JobStatus::Succeeded {
        bail!("Training {} {}", job.id, job.status);
    }
    Ok(())
}

/// Execute the cancel command.
pub async fn cancel(settings: &LorafyConfig, job_id: String) -> Result<()> {
    let service = config::remote_service(settings)?;
    let job_id = JobId(job_id);
    service.cancel_training(&job_id).await.context("Failed to cancel training")?;
    println!("{} Cancellation requested for {}", "✓".green(), job_id.0.cyan());
    Ok(())
}

fn print_job(job: &TrainingJob, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(&job.raw)?);
        return Ok(());
    }

    let status = match job.status {
        JobStatus::Succeeded => job.status.to_string().green(),
        JobStatus::Failed | JobStatus::Canceled => job.status.to_string().red(),
        _ => job.status.to_string().yellow(),
    };

    println!();
    println!("{}", "Training Status".bold().cyan());
    println!("  Job: {}", job.id.0.cyan());
    println!("  Status: {}", status);
    if let Some(destination) = &job.destination {
        println!("  Model: {}", destination);
    }
    if let Some(created_at) = job.created_at {
        println!("  Created: {}", created_at.to_rfc3339().dimmed());
    }
    if let Some(completed_at) = job.completed_at {
        println!("  Completed: {}", completed_at.to_rfc3339().dimmed());
    }
    if let Some(error) = &job.error {
        println!("  Error: {}", error.red());
    }
    if let Some(logs) = job.logs.as_deref().filter(|logs| !logs.trim().is_empty()) {
        println!();
        println!("{}", "Logs:".bold());
        println!("{}", logs.trim_end());
    }
    println!();
    Ok(())
}

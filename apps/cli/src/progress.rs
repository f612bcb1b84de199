//! Terminal progress display for training workflows.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lorafy_training::{ProgressEvent, ProgressSink, WorkflowStage};
use std::time::Duration;

/// Renders workflow progress as a spinner with one line per milestone.
pub struct SpinnerProgressSink {
    spinner: ProgressBar,
}

impl SpinnerProgressSink {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    /// A sink that renders nothing, for machine-readable output.
    pub fn hidden() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn milestone(&self, line: String) {
        self.spinner.println(line);
    }
}

impl ProgressSink for SpinnerProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { stage } => {
                let message = match stage {
                    WorkflowStage::Uploading => "Preparing and uploading archive...",
                    WorkflowStage::Creating => "Creating destination model...",
                    WorkflowStage::Submitting => "Starting training...",
                    WorkflowStage::Polling => "Waiting for training to finish...",
                    WorkflowStage::Resolving => "Looking up trained model...",
                    WorkflowStage::Succeeded | WorkflowStage::Failed => return,
                };
                self.spinner.set_message(message);
            }
            ProgressEvent::Normalized { report } if report.passes > 0 => {
                self.milestone(format!(
                    "{} Re-encoded {} images ({:.1} MiB -> {:.1} MiB)",
                    "✓".green(),
                    report.images_reencoded,
                    mib(report.original_size),
                    mib(report.normalized_size)
                ));
            }
            ProgressEvent::Normalized { .. } => {}
            ProgressEvent::Uploaded { url } => {
                self.milestone(format!("{} Uploaded {}", "✓".green(), url.dimmed()));
            }
            ProgressEvent::DestinationReady { model, created } => {
                let note = if created { "created" } else { "already exists" };
                self.milestone(format!("{} Model {} ({})", "✓".green(), model.cyan(), note));
            }
            ProgressEvent::Warning { stage, message } => {
                self.milestone(format!("{} {}: {}", "!".yellow(), stage, message));
            }
            ProgressEvent::Submitted { job_id } => {
                self.milestone(format!("{} Training started: {}", "✓".green(), job_id.0.cyan()));
            }
            ProgressEvent::Polled { attempt, status, .. } => {
                self.spinner.set_message(format!("Current status: {} (poll {})", status, attempt));
            }
            ProgressEvent::Finished { status, .. } => {
                self.spinner.set_message(format!("Training {}", status));
            }
        }
    }
}

pub fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

//! Lorafy CLI - train LoRA models from ZIP archives of images
//!
//! This CLI provides a `lorafy` command that normalizes an image archive,
//! submits it to the hosted training service, and reports the trained model.

mod commands;
mod config;
mod progress;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config as config_cmd, normalize, status, train};

/// Lorafy CLI - LoRA training from uploaded image archives
#[derive(Parser, Debug)]
#[command(
    name = "lorafy",
    author,
    version,
    about = "Lorafy - LoRA training from image archives",
    long_about = "Lorafy normalizes a ZIP of training images, uploads it to the hosted training service,\nwaits for the job to finish, and prints the trained model's URL."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file (overrides ~/.lorafy/config.toml and ./.lorafyrc)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from a ZIP archive of images
    ///
    /// The training name is taken from the file name: everything after the
    /// last underscore, lower-cased (`batch1_JaneDoe.zip` trains `janedoe`).
    Train {
        /// Path to the ZIP archive
        archive: PathBuf,

        /// Run against a simulated service without network calls
        #[arg(long)]
        dry_run: bool,

        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize a ZIP archive locally without uploading it
    Normalize {
        /// Path to the ZIP archive
        archive: PathBuf,

        /// Where to write the normalized archive
        #[arg(short, long)]
        output: PathBuf,

        /// Size budget in MiB (defaults to the configured budget)
        #[arg(long)]
        budget_mib: Option<u64>,
    },

    /// Show the current state of a training job
    Status {
        /// Training job ID
        job_id: String,

        /// Output the raw job payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Wait for a training job to finish
    Watch {
        /// Training job ID
        job_id: String,

        /// Output the final job payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel a running training job
    Cancel {
        /// Training job ID
        job_id: String,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(config_cmd::ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let settings = config::load_config(args.config.as_deref())?;

    match command {
        Command::Train { archive, dry_run, json } => {
            train::execute(&settings, &archive, dry_run, json).await?;
        }
        Command::Normalize { archive, output, budget_mib } => {
            normalize::execute(&settings, &archive, &output, budget_mib).await?;
        }
        Command::Status { job_id, json } => {
            status::status(&settings, job_id, json).await?;
        }
        Command::Watch { job_id, json } => {
            status::watch(&settings, job_id, json).await?;
        }
        Command::Cancel { job_id } => {
            status::cancel(&settings, job_id).await?;
        }
        Command::Config(command) => {
            config_cmd::execute(&settings, command)?;
        }
    }

    Ok(())
}

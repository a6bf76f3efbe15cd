//! CLI for the pldl playlist downloader.

mod commands;
mod control_socket;
mod progress;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pldl_core::config;
use pldl_core::JobId;
use std::path::PathBuf;

use commands::{run_batch, run_control, run_get, run_status, ControlAction};

/// Top-level CLI for pldl.
#[derive(Debug, Parser)]
#[command(name = "pldl")]
#[command(about = "pldl: playlist downloader with a bounded download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a single video and wait for it to finish.
    Get {
        /// Video URL.
        url: String,
        /// Source id used as the file name (default: derived from the URL).
        #[arg(long)]
        id: Option<String>,
        /// Display title (default: the source id).
        #[arg(long)]
        title: Option<String>,
        /// Target directory (default: configured download location).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Container format, e.g. mp4 or webm.
        #[arg(long)]
        format: Option<String>,
        /// Quality cap, e.g. 720p or best.
        #[arg(long)]
        quality: Option<String>,
    },

    /// Download a playlist from a JSON list of items and wait for it to finish.
    Batch {
        /// JSON file: array of {videoId, url, title, thumbnail?}.
        items: PathBuf,
        /// Playlist id.
        #[arg(long)]
        group_id: String,
        /// Playlist title, used for the folder name.
        #[arg(long)]
        group_label: String,
        /// Base directory instead of the configured download location.
        #[arg(long, value_name = "DIR")]
        location: Option<PathBuf>,
        /// Put files directly in the base directory.
        #[arg(long)]
        no_group_folder: bool,
        /// Container format for every item.
        #[arg(long)]
        format: Option<String>,
        /// Quality cap for every item.
        #[arg(long)]
        quality: Option<String>,
    },

    /// Show jobs of a running `pldl get`/`pldl batch`.
    Status,

    /// Pause a pending or active job.
    Pause {
        /// Job identifier.
        id: JobId,
    },

    /// Resume a paused job.
    Resume {
        /// Job identifier.
        id: JobId,
    },

    /// Cancel a job that has not finished.
    Cancel {
        /// Job identifier.
        id: JobId,
    },

    /// Remove a finished job from the list.
    Remove {
        /// Job identifier.
        id: JobId,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                url,
                id,
                title,
                output_dir,
                format,
                quality,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(&cfg, url, id, title, output_dir, format, quality).await?;
            }
            CliCommand::Batch {
                items,
                group_id,
                group_label,
                location,
                no_group_folder,
                format,
                quality,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let target = commands::batch_target(
                    group_id,
                    group_label,
                    location,
                    no_group_folder,
                    format,
                    quality,
                );
                run_batch(&cfg, &items, target).await?;
            }
            CliCommand::Status => run_status().await?,
            CliCommand::Pause { id } => run_control(ControlAction::Pause, id).await?,
            CliCommand::Resume { id } => run_control(ControlAction::Resume, id).await?,
            CliCommand::Cancel { id } => run_control(ControlAction::Cancel, id).await?,
            CliCommand::Remove { id } => run_control(ControlAction::Remove, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

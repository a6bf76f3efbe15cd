//! Media fetch collaborator: the one place a download actually happens.

mod parse;
mod ytdlp;

pub use parse::{parse_destination, parse_progress_line};
pub use ytdlp::{format_selector, YtDlpFetcher};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobId;

/// Everything a fetcher needs for one attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub job_id: JobId,
    pub url: String,
    pub output_dir: PathBuf,
    /// Used as the output file stem.
    pub source_id: String,
    pub format: String,
    pub quality: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub rate: Option<String>,
    pub eta: Option<String>,
}

impl ProgressUpdate {
    pub fn percent(percent: f64) -> Self {
        Self {
            percent,
            ..Self::default()
        }
    }
}

/// Receives progress for the attempt it was handed to.
pub trait ProgressCallback: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("downloader exited with {status}: {detail}")]
    ExitStatus { status: String, detail: String },
    #[error("download finished but no output file was found in {0}")]
    MissingOutput(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Called exactly once per dispatch attempt. Dropping the returned future
/// must stop the download.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &dyn ProgressCallback,
    ) -> Result<PathBuf, FetchError>;
}

//! `MediaFetcher` backed by a yt-dlp subprocess.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::parse::{parse_destination, parse_progress_line};
use super::{FetchError, FetchRequest, MediaFetcher, ProgressCallback, ProgressUpdate};
use crate::cleanup::is_partial_artifact;
use crate::config::PldlConfig;

const DEFAULT_MAX_HEIGHT: u32 = 1080;
const STDERR_TAIL_LINES: usize = 20;

/// yt-dlp `-f` selector for a container and a quality cap (`"720p"`, `"best"`).
/// Unparseable qualities fall back to 1080p.
pub fn format_selector(format: &str, quality: &str) -> String {
    let ext = if format.is_empty() { "mp4" } else { format };
    if quality.eq_ignore_ascii_case("best") {
        return format!("bestvideo[ext={ext}]+bestaudio/bestvideo+bestaudio/best[ext={ext}]/best");
    }
    let height = quality
        .trim()
        .trim_end_matches(['p', 'P'])
        .parse::<u32>()
        .unwrap_or(DEFAULT_MAX_HEIGHT);
    format!(
        "bestvideo[ext={ext}][height<=?{height}]+bestaudio[ext=m4a]/bestvideo[ext={ext}]+bestaudio/best[ext={ext}]/best"
    )
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
        }
    }
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg_location: None,
        }
    }

    pub fn from_config(cfg: &PldlConfig) -> Self {
        Self {
            program: cfg
                .ytdlp_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            ffmpeg_location: cfg.ffmpeg_path.clone(),
        }
    }

    pub fn with_ffmpeg_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(path.into());
        self
    }

    pub(crate) fn build_args(&self, req: &FetchRequest) -> Vec<String> {
        let template = req.output_dir.join(format!("{}.%(ext)s", req.source_id));
        let mut args = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--progress".to_string(),
            "--add-metadata".to_string(),
            "-f".to_string(),
            format_selector(&req.format, &req.quality),
            "--merge-output-format".to_string(),
            req.format.clone(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }
        args.push("--".to_string());
        args.push(req.url.clone());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &dyn ProgressCallback,
    ) -> Result<PathBuf, FetchError> {
        let args = self.build_args(request);
        tracing::debug!(job_id = %request.job_id, program = %self.program.display(), ?args, "spawning yt-dlp");

        // Dropping this future (pause/cancel/timeout) drops the child and kills it.
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Other("yt-dlp stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Other("yt-dlp stderr was not captured".into()))?;

        let stderr_tail = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        });

        let mut destination: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(path) = parse_destination(&line) {
                destination = Some(path);
            } else if let Some(update) = parse_progress_line(&line) {
                progress.report(update);
            }
        }

        let status = child.wait().await?;
        let tail = stderr_tail.await.unwrap_or_default();
        if !status.success() {
            let detail = tail
                .iter()
                .rev()
                .find(|l| l.contains("ERROR"))
                .or_else(|| tail.last())
                .cloned()
                .unwrap_or_else(|| "no output".to_string());
            return Err(FetchError::ExitStatus {
                status: status.to_string(),
                detail,
            });
        }

        let path = match destination {
            Some(p) if !is_partial_name(&p, &request.source_id) && p.exists() => p,
            _ => find_output(&request.output_dir, &request.source_id).await?,
        };
        progress.report(ProgressUpdate::percent(100.0));
        tracing::info!(job_id = %request.job_id, path = %path.display(), "yt-dlp finished");
        Ok(path)
    }
}

fn is_partial_name(path: &Path, source_id: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| is_partial_artifact(n, source_id))
}

/// Largest finished `<source_id>.*` file in `dir`.
async fn find_output(dir: &Path, source_id: &str) -> Result<PathBuf, FetchError> {
    let prefix = format!("{source_id}.");
    let mut best: Option<(u64, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) || is_partial_artifact(name, source_id) {
            continue;
        }
        let len = entry.metadata().await?.len();
        if len > 0 && best.as_ref().map_or(true, |(l, _)| len > *l) {
            best = Some((len, entry.path()));
        }
    }
    best.map(|(_, p)| p)
        .ok_or_else(|| FetchError::MissingOutput(dir.to_path_buf()))
}

//! A download session: one manager, the control socket, a progress printer,
//! and a wait until every submitted job has finished.

use anyhow::{bail, Context, Result};
use pldl_core::config::PldlConfig;
use pldl_core::{DownloadManager, JobEvent, JobId, JobStatus, YtDlpFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::control_socket;
use crate::cli::progress::ProgressPrinter;

const RECHECK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Session {
    pub manager: DownloadManager,
    events: tokio::sync::broadcast::Receiver<JobEvent>,
    socket: Option<std::path::PathBuf>,
}

impl Session {
    /// Build and start a manager backed by yt-dlp, and expose it on the control socket.
    pub fn start(cfg: &PldlConfig) -> Result<Self> {
        let manager = DownloadManager::builder(
            Arc::new(YtDlpFetcher::from_config(cfg)),
            Arc::new(cfg.clone()),
        )
        .job_timeout(cfg.job_timeout_secs.map(Duration::from_secs))
        .event_buffer(cfg.event_buffer)
        .build();
        let events = manager.subscribe();
        manager
            .initialize()
            .context("start download manager")?;

        let socket = match pldl_core::control::default_control_socket_path() {
            Ok(path) => match control_socket::spawn_control_listener(manager.clone(), &path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "control socket listening");
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!("control socket unavailable: {:#}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("control socket path: {}", e);
                None
            }
        };

        Ok(Self {
            manager,
            events,
            socket,
        })
    }

    /// Print progress until every job in `ids` is terminal (or Ctrl-C).
    /// Fails if any of them failed.
    pub async fn wait(mut self, ids: &[JobId]) -> Result<()> {
        let mut printer = ProgressPrinter::new();
        for rec in ids.iter().filter_map(|id| self.manager.get_by_id(id)) {
            if let Some(line) = printer.line(&JobEvent::Updated(rec)) {
                println!("{line}");
            }
        }

        let mut interrupted = false;
        while !self.all_terminal(ids) {
            tokio::select! {
                ev = self.events.recv() => match ev {
                    Ok(ev) => {
                        if ids.contains(&ev.job_id()) {
                            if let Some(line) = printer.line(&ev) {
                                println!("{line}");
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "progress printer lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(RECHECK_INTERVAL) => {}
                _ = tokio::signal::ctrl_c() => {
                    interrupted = true;
                    break;
                }
            }
        }

        let paused = self.manager.shutdown();
        if let Some(path) = &self.socket {
            let _ = std::fs::remove_file(path);
        }
        if interrupted {
            bail!("interrupted; {paused} download(s) stopped");
        }

        let records: Vec<_> = ids.iter().filter_map(|id| self.manager.get_by_id(id)).collect();
        let failed = records
            .iter()
            .filter(|r| r.status == JobStatus::Failed)
            .count();
        let completed = records
            .iter()
            .filter(|r| r.status == JobStatus::Completed)
            .count();
        println!("{completed} completed, {failed} failed, {} total", ids.len());
        if failed > 0 {
            bail!("{failed} download(s) failed");
        }
        Ok(())
    }

    /// Removed jobs count as finished.
    fn all_terminal(&self, ids: &[JobId]) -> bool {
        ids.iter().all(|id| {
            self.manager
                .get_by_id(id)
                .map_or(true, |r| r.is_terminal())
        })
    }
}

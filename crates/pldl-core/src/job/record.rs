//! The per-download record and the mutations the manager is allowed to apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::status::JobStatus;

/// Opaque job identifier, generated at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(JobId)
    }
}

/// Format/quality selection requested at submission. Missing values are
/// filled from settings when the job is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// One requested download. Snapshots of this type are what observers and
/// queries receive; the live copy is owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub source_url: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub status: JobStatus,
    pub progress_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub format: String,
    pub quality: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped whenever an in-flight or queued attempt is invalidated
    /// (pause, cancel, resume). Callbacks carrying an older value are ignored.
    #[serde(skip)]
    pub(crate) generation: u64,
}

/// Immutable inputs for a new record.
#[derive(Debug, Clone)]
pub(crate) struct NewJob {
    pub source_id: String,
    pub group_id: Option<String>,
    pub source_url: String,
    pub display_name: String,
    pub thumbnail: Option<String>,
    pub output_dir: PathBuf,
    pub format: String,
    pub quality: String,
}

impl JobRecord {
    pub(crate) fn new(job: NewJob) -> Self {
        Self {
            id: JobId::new(),
            source_id: job.source_id,
            group_id: job.group_id,
            source_url: job.source_url,
            display_name: job.display_name,
            thumbnail: job.thumbnail,
            output_dir: job.output_dir,
            output_path: None,
            status: JobStatus::Pending,
            progress_percent: 0.0,
            rate_label: None,
            eta_label: None,
            error_message: None,
            format: job.format,
            quality: job.quality,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            generation: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// pending -> active. `started_at` keeps the first activation.
    pub(crate) fn mark_active(&mut self) -> bool {
        if !self.transition(JobStatus::Active) {
            return false;
        }
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        true
    }

    /// Progress never moves backwards within an attempt.
    pub(crate) fn apply_progress(
        &mut self,
        percent: f64,
        rate: Option<String>,
        eta: Option<String>,
    ) -> bool {
        if self.status != JobStatus::Active {
            return false;
        }
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            self.progress_percent
        };
        self.progress_percent = self.progress_percent.max(percent);
        self.rate_label = rate;
        self.eta_label = eta;
        true
    }

    pub(crate) fn mark_completed(&mut self, output_path: PathBuf) -> bool {
        if !self.transition(JobStatus::Completed) {
            return false;
        }
        self.progress_percent = 100.0;
        self.eta_label = None;
        self.output_path = Some(output_path);
        self.completed_at = Some(Utc::now());
        true
    }

    pub(crate) fn mark_failed(&mut self, message: String) -> bool {
        if !self.transition(JobStatus::Failed) {
            return false;
        }
        self.error_message = Some(message);
        self.rate_label = None;
        self.eta_label = None;
        true
    }

    pub(crate) fn mark_paused(&mut self) -> bool {
        if !self.transition(JobStatus::Paused) {
            return false;
        }
        self.generation += 1;
        self.rate_label = None;
        self.eta_label = None;
        true
    }

    pub(crate) fn mark_resumed(&mut self) -> bool {
        if !self.transition(JobStatus::Pending) {
            return false;
        }
        self.generation += 1;
        true
    }

    pub(crate) fn mark_canceled(&mut self) -> bool {
        if !self.transition(JobStatus::Canceled) {
            return false;
        }
        self.generation += 1;
        self.rate_label = None;
        self.eta_label = None;
        true
    }
}

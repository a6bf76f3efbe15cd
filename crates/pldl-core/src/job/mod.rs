//! Job data model: identity, configuration and lifecycle state of one download.

mod record;
mod status;

pub use record::{DownloadOptions, JobId, JobRecord};
pub use status::JobStatus;

pub(crate) use record::NewJob;

use serde::{Deserialize, Serialize};

/// Per-status counts over every job the manager knows about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: usize,
    pub canceled: usize,
    pub total: usize,
}

impl QueueStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut stats = QueueStats::default();
        for r in records {
            match r.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Paused => stats.paused += 1,
                JobStatus::Canceled => stats.canceled += 1,
            }
            stats.total += 1;
        }
        stats
    }

    /// True when no job is pending, active or paused.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.active == 0 && self.paused == 0
    }
}

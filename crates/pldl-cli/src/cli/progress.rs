//! Per-job progress lines for the terminal.

use pldl_core::{JobEvent, JobId, JobRecord, JobStatus};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Turns job events into printable lines. Status changes always print;
/// progress within a status is throttled per job.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last: HashMap<JobId, (JobStatus, Instant)>,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, event: &JobEvent) -> Option<String> {
        self.line_at(event, Instant::now())
    }

    fn line_at(&mut self, event: &JobEvent, now: Instant) -> Option<String> {
        let rec = match event {
            JobEvent::Updated(rec) => rec,
            JobEvent::Removed(id) => {
                self.last.remove(id);
                return None;
            }
        };
        let changed = match self.last.get(&rec.id) {
            Some((status, _)) => *status != rec.status,
            None => true,
        };
        if !changed {
            let recent = self
                .last
                .get(&rec.id)
                .is_some_and(|(_, at)| now.duration_since(*at) < PROGRESS_INTERVAL);
            if recent && rec.progress_percent < 100.0 {
                return None;
            }
        }
        self.last.insert(rec.id, (rec.status, now));
        Some(format_record(rec))
    }
}

pub fn short_id(id: &JobId) -> String {
    id.to_string().chars().take(8).collect()
}

pub fn format_record(rec: &JobRecord) -> String {
    let mut line = format!(
        "[{}] {:<9} {:>5.1}%  {}",
        short_id(&rec.id),
        rec.status,
        rec.progress_percent,
        rec.display_name
    );
    match rec.status {
        JobStatus::Active => {
            if let Some(rate) = &rec.rate_label {
                line.push_str(&format!("  {rate}"));
            }
            if let Some(eta) = &rec.eta_label {
                line.push_str(&format!("  ETA {eta}"));
            }
        }
        JobStatus::Completed => {
            if let Some(path) = &rec.output_path {
                line.push_str(&format!("  -> {}", path.display()));
            }
        }
        JobStatus::Failed => {
            if let Some(err) = &rec.error_message {
                line.push_str(&format!("  ({err})"));
            }
        }
        _ => {}
    }
    line
}

//! Abort tokens for in-flight attempts, and the control socket location.
//!
//! Each dispatch attempt registers a [`CancellationToken`] under its job id and
//! attempt generation. Pause and cancel fire the token; the dispatcher races
//! the fetch against it, which drops the fetch future (and with it the
//! yt-dlp child).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

/// Shared registry of job id -> abort token for the current attempt.
#[derive(Debug, Default)]
pub struct JobControl {
    attempts: Mutex<HashMap<JobId, (u64, CancellationToken)>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a starting attempt; returns the token the fetch is raced against.
    /// A token left over from an older attempt is fired and replaced.
    pub fn register(&self, job_id: JobId, generation: u64) -> CancellationToken {
        let token = CancellationToken::new();
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, stale)) = attempts.insert(job_id, (generation, token.clone())) {
            stale.cancel();
        }
        token
    }

    /// Drop the token for a finished attempt. A newer attempt's token is left alone.
    pub fn unregister(&self, job_id: &JobId, generation: u64) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        if attempts.get(job_id).is_some_and(|(g, _)| *g == generation) {
            attempts.remove(job_id);
        }
    }

    /// Fire and drop the abort token for a job. Returns true if an attempt was running.
    pub fn request_abort(&self, job_id: &JobId) -> bool {
        let entry = self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
        match entry {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Fire every registered token (shutdown).
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, (_, token)) in &drained {
            token.cancel();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default path for the control socket (same XDG state dir as the log).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("pldl")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_fires_registered_token() {
        let control = JobControl::new();
        let id = JobId::new();
        let token = control.register(id, 0);
        assert!(!token.is_cancelled());
        assert!(control.request_abort(&id));
        assert!(token.is_cancelled());
        assert!(!control.request_abort(&id));
    }

    #[test]
    fn stale_unregister_keeps_newer_attempt() {
        let control = JobControl::new();
        let id = JobId::new();
        let old = control.register(id, 1);
        let new = control.register(id, 2);
        assert!(old.is_cancelled());
        control.unregister(&id, 1);
        assert_eq!(control.len(), 1);
        control.request_abort(&id);
        assert!(new.is_cancelled());
    }

    #[test]
    fn abort_all_drains() {
        let control = JobControl::new();
        let a = control.register(JobId::new(), 0);
        let b = control.register(JobId::new(), 0);
        assert_eq!(control.abort_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(control.is_empty());
    }
}

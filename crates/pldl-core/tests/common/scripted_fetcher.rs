//! A `MediaFetcher` the test drives step by step.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pldl_core::fetch::{FetchError, FetchRequest, MediaFetcher, ProgressCallback, ProgressUpdate};
use tokio::sync::mpsc;

enum Step {
    Progress(f64),
    Succeed,
    Fail(String),
}

/// Decrements the running count when the attempt ends, including on abort.
struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedFetcher {
    /// When set, every attempt succeeds on its own after this delay.
    auto_delay: Option<Duration>,
    attempts: Mutex<HashMap<String, mpsc::UnboundedSender<Step>>>,
    started: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn auto(delay: Duration) -> Self {
        Self {
            auto_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Source ids in the order their attempts started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// False if no live attempt exists for `source_id`.
    pub fn progress(&self, source_id: &str, percent: f64) -> bool {
        self.send(source_id, Step::Progress(percent))
    }

    pub fn succeed(&self, source_id: &str) -> bool {
        self.send(source_id, Step::Succeed)
    }

    pub fn fail(&self, source_id: &str, message: &str) -> bool {
        self.send(source_id, Step::Fail(message.to_string()))
    }

    /// Wait until an attempt for `source_id` is listening for steps.
    pub async fn wait_attempt(&self, source_id: &str) {
        for _ in 0..400 {
            let live = self
                .attempts
                .lock()
                .unwrap()
                .get(source_id)
                .is_some_and(|tx| !tx.is_closed());
            if live {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no attempt started for {source_id}");
    }

    fn send(&self, source_id: &str, step: Step) -> bool {
        self.attempts
            .lock()
            .unwrap()
            .get(source_id)
            .is_some_and(|tx| tx.send(step).is_ok())
    }
}

fn write_output(req: &FetchRequest) -> Result<PathBuf, FetchError> {
    let path = req.output_dir.join(format!("{}.{}", req.source_id, req.format));
    std::fs::write(&path, b"media")?;
    Ok(path)
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        req: &FetchRequest,
        progress: &dyn ProgressCallback,
    ) -> Result<PathBuf, FetchError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = Running(&self.running);
        self.started.lock().unwrap().push(req.source_id.clone());

        if let Some(delay) = self.auto_delay {
            progress.report(ProgressUpdate::percent(50.0));
            tokio::time::sleep(delay).await;
            progress.report(ProgressUpdate::percent(100.0));
            return write_output(req);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.attempts
            .lock()
            .unwrap()
            .insert(req.source_id.clone(), tx);
        while let Some(step) = rx.recv().await {
            match step {
                Step::Progress(percent) => progress.report(ProgressUpdate {
                    percent,
                    rate: Some("1.00MiB/s".into()),
                    eta: Some("00:10".into()),
                }),
                Step::Succeed => return write_output(req),
                Step::Fail(message) => return Err(FetchError::Other(message)),
            }
        }
        Err(FetchError::Other("script ended".into()))
    }
}

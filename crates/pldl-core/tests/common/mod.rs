#![allow(dead_code)]

pub mod scripted_fetcher;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pldl_core::destination::{DestinationError, DestinationPolicy, DestinationResolver};
use pldl_core::{DownloadManager, JobId, JobRecord, PldlConfig, SubmitRequest};

pub use scripted_fetcher::ScriptedFetcher;

pub fn config(concurrency: usize) -> PldlConfig {
    PldlConfig {
        concurrent_downloads: concurrency,
        ..PldlConfig::default()
    }
}

pub fn manager(fetcher: &Arc<ScriptedFetcher>, concurrency: usize) -> DownloadManager {
    let m = DownloadManager::builder(fetcher.clone(), Arc::new(config(concurrency))).build();
    m.initialize().expect("initialize");
    m
}

pub fn request(source_id: &str, dir: &Path) -> SubmitRequest {
    SubmitRequest {
        url: format!("https://www.youtube.com/watch?v={source_id}"),
        source_id: source_id.to_string(),
        title: format!("Video {source_id}"),
        output_dir: dir.to_path_buf(),
        ..SubmitRequest::default()
    }
}

/// Poll until `pred` holds for the job, panicking after two seconds.
pub async fn wait_for(
    m: &DownloadManager,
    id: &JobId,
    what: &str,
    pred: impl Fn(&JobRecord) -> bool,
) -> JobRecord {
    for _ in 0..400 {
        if let Some(rec) = m.get_by_id(id) {
            if pred(&rec) {
                return rec;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never became {what}: {:?}", m.get_by_id(id));
}

/// Filesystem-free resolver that counts calls.
#[derive(Default)]
pub struct CountingResolver {
    pub calls: AtomicUsize,
    pub dir: std::path::PathBuf,
}

impl CountingResolver {
    pub fn new(dir: &Path) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            dir: dir.to_path_buf(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DestinationResolver for CountingResolver {
    async fn resolve(
        &self,
        group_id: &str,
        _group_label: &str,
        _policy: &DestinationPolicy,
    ) -> Result<std::path::PathBuf, DestinationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if group_id == "unresolvable" {
            return Err(DestinationError::Invalid("no space left".into()));
        }
        Ok(self.dir.join(group_id))
    }
}

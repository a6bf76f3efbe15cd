//! Bounded-concurrency download queue for playlist downloads.
//!
//! [`DownloadManager`] accepts download requests, runs at most N of them at
//! once through a [`MediaFetcher`], tracks each job's lifecycle and streams
//! [`JobEvent`]s to observers.

pub mod batch;
pub mod cleanup;
pub mod config;
pub mod control;
pub mod destination;
pub mod error;
pub mod fetch;
pub mod job;
pub mod logging;
pub mod manager;
pub mod notifier;
pub mod queue;
pub mod registry;

pub use batch::{BatchItem, BatchTarget};
pub use config::{PldlConfig, SettingsSource, SharedSettings};
pub use destination::{DestinationPolicy, DestinationResolver, FsDestinationResolver};
pub use error::{ManagerError, ManagerResult};
pub use fetch::{FetchError, FetchRequest, MediaFetcher, ProgressCallback, ProgressUpdate, YtDlpFetcher};
pub use job::{DownloadOptions, JobId, JobRecord, JobStatus, QueueStats};
pub use manager::{DownloadManager, DownloadManagerBuilder, SubmitRequest};
pub use notifier::{JobEvent, ProgressSink};

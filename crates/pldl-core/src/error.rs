//! Error types surfaced by the download manager.

use thiserror::Error;

use crate::destination::DestinationError;

#[derive(Debug, Error)]
pub enum ManagerError {
    /// Rejected input; no state was created.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("download manager is not initialized")]
    NotInitialized,
    #[error("no Tokio runtime is running on this thread")]
    NoRuntime,
    #[error("download manager is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Destination(#[from] DestinationError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

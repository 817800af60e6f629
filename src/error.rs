// -----------------------------------------------------------------------------
// Closed error taxonomy: configuration, resource, task failure
// -----------------------------------------------------------------------------

use std::path::PathBuf;

use thiserror::Error;

/// Every failure the library surfaces. Configuration and resource errors are
/// terminal for the run; a task failure is re-raised to the one awaiter of
/// that task's handle and leaves the pool and other tasks untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{path}: {message}")]
    Resource { path: PathBuf, message: String },

    #[error("task failed: {0}")]
    TaskFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Errors surfaced by the queue lifecycle.

use thiserror::Error;

/// Error starting the worker pool.
#[derive(Debug, Error)]
pub enum StartError {
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

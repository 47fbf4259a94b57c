//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// Directory listing and file read failures are local: the tree model and the
/// ingestor turn them into events and per-file results instead of returning
/// them. Only an invalid root, an unknown node, a cancelled batch or a
/// broken worker pool reach the caller as an `Err`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A directory could not be listed (permission denied, removed concurrently, ...).
    #[error("Cannot access {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory resolves to itself or to one of its expanded ancestors.
    #[error("Skipped symlink cycle at {0}")]
    CycleSkipped(PathBuf),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// The path does not name a node in the loaded part of the tree.
    #[error("No loaded tree node for path: {0}")]
    NodeNotFound(PathBuf),

    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// The bounded worker pool for a batch could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Represents an error that occurred when a Tokio task was joined.
    /// This is often due to a task panicking or being cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A session command needs an open folder and there is none.
    #[error("No folder is open")]
    NoFolderOpen,

    /// Represents a user-initiated cancellation of an operation.
    #[error("Operation was cancelled by the user")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;

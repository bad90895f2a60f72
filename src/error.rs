//! Error types for the twivility service.
//!
//! Every fallible operation in the crate returns [`Error`]. Variants are split
//! into two families: fatal conditions that must reach the process boundary
//! (a corrupt store, a second concurrent stream, file-system failures) and
//! recoverable ones that the periodic scheduler simply logs and retries on the
//! next tick (remote fetch, search and stream-open failures).

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The persisted store could not be decoded. Continuing would silently
    /// shrink the dedup set, so this is never recoverable.
    #[error("corrupt record store {}: {source}", .path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A second live stream tried to start while one was already registered.
    #[error("live stream already running: refusing to start a second writer")]
    StreamAlreadyRunning,

    /// Unexpected file-system failure (create, open, write, rename).
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timeline page fetch failed.
    #[error("timeline fetch failed: {0}")]
    Fetch(String),

    /// The backfill search failed.
    #[error("search failed: {0}")]
    Search(String),

    /// The live filtered subscription could not be opened.
    #[error("could not open live stream: {0}")]
    StreamOpen(String),

    /// The remote API answered with a non-success status.
    #[error("Twitter API error for operation '{operation}' ({status})")]
    Api { operation: String, status: u16 },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote payload or outgoing document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking file-system task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// The cron scheduler could not be created or configured.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

impl Error {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for conditions the process cannot safely continue past.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorruptStore { .. }
                | Error::StreamAlreadyRunning
                | Error::Io { .. }
                | Error::Blocking(_)
        )
    }
}

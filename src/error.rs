//! Error types for fetching log text.
//!
//! Fetch failures are transient: the poller logs them, counts them and retries on the
//! next tick. Nothing in the tail or search path is fatal.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a log snapshot from a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The log endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}")]
    Http { status: u16 },

    /// The HTTP request itself failed (connect, TLS, body decode).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A helper command (docker, kubectl, ssh) exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: &'static str,
        status: String,
        stderr: String,
    },

    /// A helper command could not be started.
    #[error("failed to start {program}: {reason}. Is it installed?")]
    Spawn {
        program: &'static str,
        reason: String,
    },

    /// The fetch did not complete within the configured timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The source description is unusable (e.g. option injection in a pod name).
    #[error("invalid source: {0}")]
    InvalidSource(String),
}

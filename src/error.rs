//! Per-sink error taxonomy.
//!
//! Every variant here ends up inside a `SinkResult`; nothing crosses the
//! append-engine boundary as a panic or an early return. One sink's failure
//! must never abort another sink's write.

use std::io;
use thiserror::Error;

/// Why a single sink's append failed.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The target file stayed locked by another process for the whole retry
    /// budget.
    #[error("target file still locked after {attempts} attempts")]
    LockTimeout { attempts: usize },

    /// Missing directory, permission denied creating a new file, disk full,
    /// and other non-transient filesystem failures.
    #[error("filesystem error: {0}")]
    Structural(#[from] io::Error),

    /// The write call reported success but the readback did not show the new
    /// content.
    #[error("post-write verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// The existing structured-list file could not be parsed, so the record
    /// could not be merged into it.
    #[error("structured-list file unreadable: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Encoding the record as a CSV row failed.
    #[error("tabular encoding failed: {0}")]
    Tabular(#[from] csv::Error),
}

impl SinkError {
    /// Check if this error is lock-contention exhaustion.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Check if this error is a structural filesystem failure.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }

    /// Check if this error was raised by the post-write readback.
    pub fn is_verification_failed(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. })
    }
}

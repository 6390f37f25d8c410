#![forbid(unsafe_code)]

//! # rollcall
//!
//! Durable, crash-tolerant attendance logging. Each invocation builds one
//! immutable [`AttendanceRecord`] and appends it to every configured sink
//! (plain-text journal, structured JSON list, CSV table), isolating failures
//! per sink so that at least one copy lands even when another format's writer
//! fails midway.
//!
//! The hard part lives in [`AppendEngine`]: bounded retry when a sink's file
//! is locked by another process, crash-atomic temp-file-plus-rename writes,
//! fsync before success is reported (the caller may be killed by an OS
//! shutdown moments later), and post-write verification that the new content
//! is observably on disk.
//!
//! ## Quick start
//!
//! ```no_run
//! use rollcall::{AppendEngine, EventKind, RecordBuilder, SinkDescriptor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let record = RecordBuilder::new(EventKind::Login).build();
//!     let engine = AppendEngine::new(vec![
//!         SinkDescriptor::plain_text("logs/attendance_log.txt"),
//!         SinkDescriptor::structured_list("logs/attendance_log.json"),
//!         SinkDescriptor::tabular("logs/attendance_log.csv"),
//!     ]);
//!     let report = engine.append_everywhere(&record).await;
//!     assert!(report.succeeded() > 0, "no sink accepted the record");
//! }
//! ```

pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod record;
pub mod retry;
pub mod sink;
pub mod sleeper;

// Re-exports
pub use encoding::Encoding;
pub use engine::{AcquireError, AppendEngine};
pub use error::SinkError;
pub use record::{AttendanceRecord, Clock, EventKind, EventStatus, RecordBuilder, WallClock};
pub use retry::{Backoff, RetryError, RetryPolicy, RetryPolicyBuilder};
pub use sink::{AppendReport, SinkDescriptor, SinkResult};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};

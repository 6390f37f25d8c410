//! Sink descriptors and per-invocation outcome aggregation.

use crate::encoding::Encoding;
use crate::error::SinkError;
use std::path::{Path, PathBuf};

/// One independent output destination: where to write and how to encode.
#[derive(Debug, Clone)]
pub struct SinkDescriptor {
    pub path: PathBuf,
    pub encoding: Encoding,
    /// `true`: new content is appended in place. `false`: the file is
    /// rewritten in full through an atomic temp-file-plus-rename.
    pub append_mode: bool,
}

impl SinkDescriptor {
    /// Plain-text journal: append-only, each block self-delimited.
    pub fn plain_text<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), encoding: Encoding::PlainText, append_mode: true }
    }

    /// JSON list of record objects: whole-file read-modify-rewrite.
    pub fn structured_list<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            encoding: Encoding::StructuredList,
            append_mode: false,
        }
    }

    /// CSV table: whole-file rewrite so readers never observe a torn row.
    pub fn tabular<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            encoding: Encoding::TabularRows,
            append_mode: false,
        }
    }
}

/// Outcome of one sink's append.
#[derive(Debug)]
pub struct SinkResult {
    pub path: PathBuf,
    pub encoding: Encoding,
    /// Bytes this invocation put on disk: the payload for append sinks, the
    /// whole rewritten file for rewrite sinks. Zero on failure.
    pub bytes_written: u64,
    pub error: Option<SinkError>,
}

impl SinkResult {
    pub fn success(sink: &SinkDescriptor, bytes_written: u64) -> Self {
        Self { path: sink.path.clone(), encoding: sink.encoding, bytes_written, error: None }
    }

    pub fn failure(sink: &SinkDescriptor, error: SinkError) -> Self {
        Self { path: sink.path.clone(), encoding: sink.encoding, bytes_written: 0, error: Some(error) }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome across all sinks of one invocation. Constructed fresh
/// per call and never persisted; the durable state is the sink files.
#[derive(Debug, Default)]
pub struct AppendReport {
    pub results: Vec<SinkResult>,
}

impl AppendReport {
    pub fn push(&mut self, result: SinkResult) {
        self.results.push(result);
    }

    /// Number of sinks attempted.
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Number of sinks whose write landed and verified.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    /// The invocation counts as a success when at least one durable copy of
    /// the record landed.
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn sink() -> SinkDescriptor {
        SinkDescriptor::tabular("/tmp/attendance_log.csv")
    }

    #[test]
    fn succeeded_counts_only_clean_results() {
        let mut report = AppendReport::default();
        report.push(SinkResult::success(&sink(), 120));
        report.push(SinkResult::failure(&sink(), SinkError::LockTimeout { attempts: 3 }));
        report.push(SinkResult::success(&sink(), 80));

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(report.succeeded() <= report.attempted());
        assert!(report.is_success());
    }

    #[test]
    fn all_failed_report_is_not_a_success() {
        let mut report = AppendReport::default();
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        report.push(SinkResult::failure(&sink(), io_err.into()));
        assert_eq!(report.succeeded(), 0);
        assert!(!report.is_success());
    }

    #[test]
    fn empty_report_is_not_a_success() {
        assert!(!AppendReport::default().is_success());
    }

    #[test]
    fn descriptor_constructors_set_the_write_discipline() {
        assert!(SinkDescriptor::plain_text("a.txt").append_mode);
        assert!(!SinkDescriptor::structured_list("a.json").append_mode);
        assert!(!SinkDescriptor::tabular("a.csv").append_mode);
    }
}

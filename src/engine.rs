//! Redundant append engine.
//!
//! Appends one record to every configured sink, one sink at a time. Each
//! sink is handled independently: lock contention is retried within a
//! bounded budget, structural failures are captured, and every write is
//! flushed and synced to the physical medium before it counts, because the
//! caller may be killed by an OS shutdown moments after this returns. The engine
//! itself is infallible: every outcome lands in the [`AppendReport`].
//!
//! Write disciplines:
//! - Plain text: direct append of a self-delimited block.
//! - Tabular: prior content plus the new row rewritten through a sibling
//!   temp file, synced, then renamed over the target, so readers never
//!   observe a half-written table.
//! - Structured list: whole-array read-modify-rewrite, through the same
//!   temp-file-plus-rename discipline as the tabular sink.

use crate::encoding::{self, Encoding};
use crate::error::SinkError;
use crate::record::AttendanceRecord;
use crate::retry::{Backoff, RetryError, RetryPolicy};
use crate::sink::{AppendReport, SinkDescriptor, SinkResult};
use crate::sleeper::Sleeper;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Files at or below this size are treated as never initialized: the sink's
/// header is (re)written on the next append. Catches both absent files and
/// files truncated to a stray byte or two by an earlier crash.
pub const HEADER_THRESHOLD_BYTES: u64 = 10;

/// Lock-acquire budget: total attempts per sink before giving up.
pub const DEFAULT_LOCK_ATTEMPTS: usize = 3;

/// Fixed delay between lock-acquire attempts.
pub const DEFAULT_LOCK_DELAY: Duration = Duration::from_secs(1);

/// Open/read failure with the contention decision already attached: deciding
/// whether a permission error is a lock or a real permission problem needs
/// to know whether the target existed at the time.
#[derive(Debug)]
pub struct AcquireError {
    source: io::Error,
    contention: bool,
}

impl AcquireError {
    fn classify(target: &Path, source: io::Error) -> Self {
        let contention = is_lock_contention(target, &source);
        Self { source, contention }
    }

    /// Transient contention worth retrying within the lock budget.
    pub fn is_contention(&self) -> bool {
        self.contention
    }

    pub fn into_source(self) -> io::Error {
        self.source
    }
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Appends records to an ordered list of sinks, isolating failures per sink.
#[derive(Debug)]
pub struct AppendEngine {
    sinks: Vec<SinkDescriptor>,
    acquire: RetryPolicy<AcquireError>,
}

impl AppendEngine {
    /// Engine with the default lock budget (3 attempts, 1 s apart, real
    /// sleeping).
    pub fn new(sinks: Vec<SinkDescriptor>) -> Self {
        let builder = RetryPolicy::builder();
        Self { sinks, acquire: Self::default_acquire(builder) }
    }

    /// Swap the sleeper while keeping the default budget. Tests use this to
    /// retry without real delays.
    pub fn with_sleeper(self, sleeper: Arc<dyn Sleeper>) -> Self {
        let builder = RetryPolicy::builder().with_sleeper_arc(sleeper);
        Self { acquire: Self::default_acquire(builder), ..self }
    }

    fn default_acquire(
        builder: crate::retry::RetryPolicyBuilder<AcquireError>,
    ) -> RetryPolicy<AcquireError> {
        builder
            .max_attempts(DEFAULT_LOCK_ATTEMPTS)
            .backoff(Backoff::constant(DEFAULT_LOCK_DELAY))
            .should_retry(AcquireError::is_contention)
            .build()
            .expect("default lock budget is non-zero")
    }

    /// Replace the whole acquire policy (budget, schedule, retryability).
    pub fn with_acquire_policy(mut self, policy: RetryPolicy<AcquireError>) -> Self {
        self.acquire = policy;
        self
    }

    pub fn sinks(&self) -> &[SinkDescriptor] {
        &self.sinks
    }

    /// Append `record` to every sink in order. Never fails: per-sink errors
    /// are captured in the report, and one sink's contention or breakage
    /// does not block the others.
    pub async fn append_everywhere(&self, record: &AttendanceRecord) -> AppendReport {
        let mut report = AppendReport::default();
        for sink in &self.sinks {
            match self.append_one(sink, record).await {
                Ok(bytes) => {
                    info!(path = %sink.path.display(), bytes, "sink write verified");
                    report.push(SinkResult::success(sink, bytes));
                }
                Err(error) => {
                    warn!(path = %sink.path.display(), %error, "sink write failed");
                    report.push(SinkResult::failure(sink, error));
                }
            }
        }
        report
    }

    async fn append_one(
        &self,
        sink: &SinkDescriptor,
        record: &AttendanceRecord,
    ) -> Result<u64, SinkError> {
        match sink.encoding {
            Encoding::PlainText => self.append_plain_text(sink, record).await,
            Encoding::StructuredList => self.rewrite_structured_list(sink, record).await,
            Encoding::TabularRows => self.rewrite_tabular(sink, record).await,
        }
    }

    /// Plain-text journal: append one block, banner first if the file has
    /// never held a record.
    async fn append_plain_text(
        &self,
        sink: &SinkDescriptor,
        record: &AttendanceRecord,
    ) -> Result<u64, SinkError> {
        let existing = existing_size(&sink.path)?;
        let mut payload = String::new();
        if existing <= HEADER_THRESHOLD_BYTES {
            debug!(path = %sink.path.display(), "uninitialized journal, writing banner");
            payload.push_str(&encoding::plain_text_banner());
        }
        payload.push_str(&encoding::plain_text_block(record));

        let mut file = self.acquire_append(&sink.path).await?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        verify_size(&sink.path, existing + payload.len() as u64)?;
        verify_plain_text_tail(&sink.path)?;
        Ok(payload.len() as u64)
    }

    /// Tabular sink: carry the accumulated table forward, add one row, and
    /// atomically replace the target. Rewriting the whole file per append is
    /// acceptable at a few events per day.
    async fn rewrite_tabular(
        &self,
        sink: &SinkDescriptor,
        record: &AttendanceRecord,
    ) -> Result<u64, SinkError> {
        let existing = self.acquire_read(&sink.path).await?;
        let mut content = Vec::new();
        if existing.len() as u64 <= HEADER_THRESHOLD_BYTES {
            debug!(path = %sink.path.display(), "uninitialized table, writing header row");
            content.extend_from_slice(&encoding::tabular_header()?);
        } else {
            content.extend_from_slice(&existing);
        }
        content.extend_from_slice(&encoding::tabular_row(record)?);

        let written = replace_file(&sink.path, &content)?;
        verify_size(&sink.path, written)?;
        Ok(written)
    }

    /// Structured-list sink: parse the whole collection, push the record,
    /// re-serialize, and atomically replace the target.
    async fn rewrite_structured_list(
        &self,
        sink: &SinkDescriptor,
        record: &AttendanceRecord,
    ) -> Result<u64, SinkError> {
        let existing = self.acquire_read(&sink.path).await?;
        let mut records = if existing.len() as u64 <= HEADER_THRESHOLD_BYTES {
            Vec::new()
        } else {
            encoding::parse_structured_list(&existing)?
        };
        records.push(record.clone());
        let content = encoding::render_structured_list(&records)?;

        let written = replace_file(&sink.path, &content)?;
        verify_size(&sink.path, written)?;
        Ok(written)
    }

    /// Open the target for appending, retrying lock contention within the
    /// budget. Exhausting the budget is a `LockTimeout`; anything the
    /// predicate calls non-transient is `Structural` immediately.
    async fn acquire_append(&self, path: &Path) -> Result<File, SinkError> {
        let result = self
            .acquire
            .execute(|| {
                let target = path.to_path_buf();
                async move {
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&target)
                        .map_err(|source| AcquireError::classify(&target, source))
                }
            })
            .await;
        match result {
            Ok(file) => Ok(file),
            Err(RetryError::Exhausted { attempts, .. }) => {
                Err(SinkError::LockTimeout { attempts })
            }
            Err(RetryError::Fatal(e)) => Err(SinkError::Structural(e.into_source())),
        }
    }

    /// Read the target's current content under the same contention budget.
    /// An absent file reads as empty.
    async fn acquire_read(&self, path: &Path) -> Result<Vec<u8>, SinkError> {
        let result = self
            .acquire
            .execute(|| {
                let target = path.to_path_buf();
                async move {
                    match fs::read(&target) {
                        Ok(bytes) => Ok(bytes),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                        Err(e) => Err(AcquireError::classify(&target, e)),
                    }
                }
            })
            .await;
        match result {
            Ok(bytes) => Ok(bytes),
            Err(RetryError::Exhausted { attempts, .. }) => {
                Err(SinkError::LockTimeout { attempts })
            }
            Err(RetryError::Fatal(e)) => Err(SinkError::Structural(e.into_source())),
        }
    }
}

/// Transient open/read failures worth retrying. A locked file surfaces as
/// `PermissionDenied` on Windows (sharing violations additionally carry raw
/// OS errors 32/33) and as `WouldBlock` under advisory locking. A permission
/// error on a target that does not exist yet cannot be a lock on that file,
/// so it is structural, not contention.
fn is_lock_contention(target: &Path, err: &io::Error) -> bool {
    #[cfg(windows)]
    {
        if matches!(err.raw_os_error(), Some(32) | Some(33)) {
            return true;
        }
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => target.exists(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => true,
        _ => false,
    }
}

fn existing_size(path: &Path) -> Result<u64, SinkError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Sibling temp path so the rename never crosses a filesystem boundary.
fn sibling_temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `content` to a sibling temp file, sync it to the medium, then
/// atomically rename it over the target. Readers of the target either see
/// the old content or the new content, never a prefix.
fn replace_file(path: &Path, content: &[u8]) -> Result<u64, SinkError> {
    let tmp = sibling_temp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(content)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        // leave the target untouched; the stale temp file is truncated by
        // the next attempt
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(content.len() as u64)
}

/// The write call succeeded; confirm the bytes are observably present.
fn verify_size(path: &Path, expected: u64) -> Result<(), SinkError> {
    let found = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if found < expected {
        return Err(SinkError::VerificationFailed {
            reason: format!("expected at least {expected} bytes, found {found}"),
        });
    }
    Ok(())
}

/// Plain-text journal ends with a rule line after every complete block.
fn verify_plain_text_tail(path: &Path) -> Result<(), SinkError> {
    let contents = fs::read_to_string(path)?;
    let last = contents.lines().rev().find(|line| !line.trim().is_empty());
    if last != Some(encoding::plain_text_rule().as_str()) {
        return Err(SinkError::VerificationFailed {
            reason: format!(
                "journal does not end with a rule line (last line: {:?})",
                last.unwrap_or("")
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventKind, EventStatus};
    use tempfile::TempDir;

    fn sample() -> AttendanceRecord {
        AttendanceRecord {
            date: "2024-01-15".into(),
            weekday: "Monday".into(),
            time: "08:05:00".into(),
            host: "WS-01".into(),
            user: "jdoe".into(),
            event: EventKind::Login,
            status: EventStatus::Success,
        }
    }

    #[test]
    fn sibling_temp_path_stays_in_the_same_directory() {
        let tmp = sibling_temp_path(Path::new("/var/logs/attendance_log.csv"));
        assert_eq!(tmp, Path::new("/var/logs/attendance_log.csv.tmp"));
    }

    #[test]
    fn permission_denied_is_contention_only_when_the_target_exists() {
        let dir = TempDir::new().unwrap();
        let held = dir.path().join("attendance_log.txt");
        fs::write(&held, b"in use by another writer").unwrap();
        let brand_new = dir.path().join("never_created.txt");
        let denied = || io::Error::new(io::ErrorKind::PermissionDenied, "denied");

        assert!(is_lock_contention(&held, &denied()));
        assert!(!is_lock_contention(&brand_new, &denied()));
    }

    #[test]
    fn contention_classification() {
        let target = Path::new("/var/logs/attendance_log.txt");
        assert!(is_lock_contention(target, &io::Error::new(io::ErrorKind::WouldBlock, "busy")));
        assert!(is_lock_contention(target, &io::Error::new(io::ErrorKind::Interrupted, "eintr")));
        assert!(!is_lock_contention(target, &io::Error::new(io::ErrorKind::NotFound, "no dir")));
    }

    #[test]
    fn classified_errors_keep_the_source_and_the_decision() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never_created.txt");
        let err = AcquireError::classify(
            &missing,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_contention());
        assert_eq!(err.into_source().kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn verify_size_flags_short_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.txt");
        fs::write(&path, b"abc").unwrap();
        assert!(verify_size(&path, 3).is_ok());
        let err = verify_size(&path, 10).unwrap_err();
        assert!(err.is_verification_failed());
    }

    #[test]
    fn verify_size_flags_missing_files() {
        let dir = TempDir::new().unwrap();
        let err = verify_size(&dir.path().join("gone.txt"), 1).unwrap_err();
        assert!(err.is_verification_failed());
    }

    #[test]
    fn verify_tail_accepts_a_complete_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.txt");
        let mut body = encoding::plain_text_banner();
        body.push_str(&encoding::plain_text_block(&sample()));
        fs::write(&path, body).unwrap();
        assert!(verify_plain_text_tail(&path).is_ok());
    }

    #[test]
    fn verify_tail_rejects_a_torn_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.txt");
        fs::write(&path, "Date: 2024-01-15 (Monday)\nTime: 08:0").unwrap();
        let err = verify_plain_text_tail(&path).unwrap_err();
        assert!(err.is_verification_failed());
    }

    #[test]
    fn replace_file_swaps_content_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(&path, b"old").unwrap();

        let written = replace_file(&path, b"new content").unwrap();
        assert_eq!(written, 11);
        assert_eq!(fs::read(&path).unwrap(), b"new content");
        assert!(!sibling_temp_path(&path).exists());
    }

    #[test]
    fn replace_file_truncates_a_stale_temp_from_a_crashed_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(sibling_temp_path(&path), b"half-written garbage from a dead process").unwrap();

        replace_file(&path, b"fresh").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"fresh");
        assert!(!sibling_temp_path(&path).exists());
    }
}

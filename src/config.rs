//! Sink-set construction for the zero-argument binary.
//!
//! The invocation surface stays flag-free (the external trigger runs the
//! command with no arguments), so the few knobs that exist are environment
//! variables.

use crate::record::EventKind;
use crate::sink::SinkDescriptor;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overrides the directory the sink files live in.
pub const LOG_DIR_ENV: &str = "ROLLCALL_LOG_DIR";

/// Selects the event kind (`login` default, `shutdown` when the deployment
/// trigger sets it).
pub const EVENT_ENV: &str = "ROLLCALL_EVENT";

pub const PLAIN_TEXT_FILE: &str = "attendance_log.txt";
pub const STRUCTURED_LIST_FILE: &str = "attendance_log.json";
pub const TABULAR_FILE: &str = "attendance_log.csv";

/// Resolve the sink directory: env override first, otherwise `logs/` beside
/// the install directory, falling back to the executable's own directory
/// when that cannot be created.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = env::var(LOG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    default_log_dir()
}

fn default_log_dir() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let preferred = exe_dir.parent().unwrap_or(&exe_dir).join("logs");
    match fs::create_dir_all(&preferred) {
        Ok(()) => preferred,
        Err(error) => {
            debug!(%error, dir = %preferred.display(), "cannot create logs dir, using exe dir");
            exe_dir
        }
    }
}

/// The three redundant sinks, in the order they are attempted: the
/// plain-text journal first (most robust), then the structured list, then
/// the spreadsheet-facing table.
pub fn default_sinks(dir: &Path) -> Vec<SinkDescriptor> {
    vec![
        SinkDescriptor::plain_text(dir.join(PLAIN_TEXT_FILE)),
        SinkDescriptor::structured_list(dir.join(STRUCTURED_LIST_FILE)),
        SinkDescriptor::tabular(dir.join(TABULAR_FILE)),
    ]
}

/// Event kind for this invocation.
pub fn event_kind() -> EventKind {
    event_kind_from(env::var(EVENT_ENV).ok().as_deref())
}

fn event_kind_from(raw: Option<&str>) -> EventKind {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("shutdown") => EventKind::Shutdown,
        _ => EventKind::Login,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn default_sinks_cover_all_three_encodings_in_order() {
        let sinks = default_sinks(Path::new("/var/logs"));
        assert_eq!(sinks.len(), 3);
        assert_eq!(sinks[0].encoding, Encoding::PlainText);
        assert_eq!(sinks[1].encoding, Encoding::StructuredList);
        assert_eq!(sinks[2].encoding, Encoding::TabularRows);
        assert_eq!(sinks[0].path, Path::new("/var/logs/attendance_log.txt"));
        assert_eq!(sinks[1].path, Path::new("/var/logs/attendance_log.json"));
        assert_eq!(sinks[2].path, Path::new("/var/logs/attendance_log.csv"));
    }

    #[test]
    fn event_kind_parses_shutdown_case_insensitively() {
        assert_eq!(event_kind_from(Some("shutdown")), EventKind::Shutdown);
        assert_eq!(event_kind_from(Some(" Shutdown ")), EventKind::Shutdown);
    }

    #[test]
    fn event_kind_defaults_to_login() {
        assert_eq!(event_kind_from(None), EventKind::Login);
        assert_eq!(event_kind_from(Some("")), EventKind::Login);
        assert_eq!(event_kind_from(Some("reboot")), EventKind::Login);
    }
}

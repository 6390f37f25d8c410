//! Attendance record construction.
//!
//! The builder reads the clock exactly once so every derived field (date,
//! weekday, wall-clock time) comes from the same instant, resolves host and
//! user identity through fallback chains, and never fails outward: anything
//! that cannot be determined degrades to the `"Unknown"` sentinel.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel used when host or user identity cannot be resolved.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// What kind of session event is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Login,
    Shutdown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Login => write!(f, "Login"),
            EventKind::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Outcome recorded alongside the event. The builder itself never fails, so
/// today this is always `Success`; `Failure` is the extension point for
/// partial-identity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Success,
    Failure,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Success => write!(f, "Success"),
            EventStatus::Failure => write!(f, "Failure"),
        }
    }
}

/// One attendance event, fully derived at build time.
///
/// Serde field names match the historical column titles so structured-list
/// files written by earlier deployments keep parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Day")]
    pub weekday: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Computer Name")]
    pub host: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Event")]
    pub event: EventKind,
    #[serde(rename = "Status")]
    pub status: EventStatus,
}

/// Clock abstraction so record timestamps can be faked in tests.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time in the machine's local timezone.
    fn now(&self) -> NaiveDateTime;
}

/// Production clock reading the local system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Builds an [`AttendanceRecord`] from the current environment.
#[derive(Debug)]
pub struct RecordBuilder {
    event: EventKind,
    clock: Box<dyn Clock>,
}

impl RecordBuilder {
    pub fn new(event: EventKind) -> Self {
        Self { event, clock: Box::new(WallClock) }
    }

    /// Replace the wall clock, for deterministic records in tests.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Assemble the record. Reads the clock once; date, weekday, and time all
    /// derive from that single instant so the fields can never skew across a
    /// midnight boundary.
    pub fn build(&self) -> AttendanceRecord {
        let now = self.clock.now();
        AttendanceRecord {
            date: now.format("%Y-%m-%d").to_string(),
            weekday: now.format("%A").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            host: resolve_host(),
            user: resolve_user(),
            event: self.event,
            status: EventStatus::Success,
        }
    }
}

fn resolve_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

fn resolve_user() -> String {
    resolve_user_from(|key| std::env::var(key).ok())
}

/// Identity fallback chain: `USER`, then `USERNAME`, then the sentinel.
/// The lookup is injected so the chain is testable without touching the
/// process environment.
fn resolve_user_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ["USER", "USERNAME"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Clone, Copy)]
    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 5, 0).unwrap()
    }

    #[test]
    fn derived_fields_come_from_one_instant() {
        let record =
            RecordBuilder::new(EventKind::Login).with_clock(FixedClock(monday_morning())).build();

        assert_eq!(record.date, "2024-01-15");
        assert_eq!(record.weekday, "Monday");
        assert_eq!(record.time, "08:05:00");
        assert_eq!(record.event, EventKind::Login);
        assert_eq!(record.status, EventStatus::Success);
    }

    #[test]
    fn builder_never_produces_empty_identity() {
        let record =
            RecordBuilder::new(EventKind::Shutdown).with_clock(FixedClock(monday_morning())).build();
        assert!(!record.host.is_empty());
        assert!(!record.user.is_empty());
    }

    #[test]
    fn user_prefers_user_over_username() {
        let user = resolve_user_from(|key| match key {
            "USER" => Some("jdoe".to_string()),
            "USERNAME" => Some("other".to_string()),
            _ => None,
        });
        assert_eq!(user, "jdoe");
    }

    #[test]
    fn user_falls_through_to_username() {
        let user = resolve_user_from(|key| match key {
            "USERNAME" => Some("jdoe".to_string()),
            _ => None,
        });
        assert_eq!(user, "jdoe");
    }

    #[test]
    fn user_falls_back_to_unknown() {
        let user = resolve_user_from(|_| None);
        assert_eq!(user, UNKNOWN_IDENTITY);
    }

    #[test]
    fn blank_env_values_are_skipped() {
        let user = resolve_user_from(|key| match key {
            "USER" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(user, UNKNOWN_IDENTITY);
    }

    #[test]
    fn event_and_status_display_as_wire_names() {
        assert_eq!(EventKind::Login.to_string(), "Login");
        assert_eq!(EventKind::Shutdown.to_string(), "Shutdown");
        assert_eq!(EventStatus::Success.to_string(), "Success");
        assert_eq!(EventStatus::Failure.to_string(), "Failure");
    }
}

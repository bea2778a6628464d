use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp fields tried, in order, when resolving a record's check-in time.
pub const DEFAULT_TIME_FIELDS: [&str; 4] = [
    "operdate",
    "watertime",
    "intime",
    "classWaterBean.operdate",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub course: String,
    pub start: NaiveDateTime,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub timestamp: NaiveDateTime,
    pub subject: String,
    pub teacher: String,
    pub room: Option<String>,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.timestamp.format(DISPLAY_FORMAT),
            self.subject,
            self.teacher
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Name,
    TimeWindow,
    None,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Name => "name",
            MatchKind::TimeWindow => "time_window",
            MatchKind::None => "none",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "name" => MatchKind::Name,
            "time_window" => MatchKind::TimeWindow,
            _ => MatchKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub kind: MatchKind,
    pub candidates: Vec<Candidate>,
}

impl MatchResult {
    pub fn miss() -> Self {
        Self {
            matched: false,
            kind: MatchKind::None,
            candidates: Vec::new(),
        }
    }
}

/// Inclusive interval around an event start, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    pub before_minutes: i64,
    pub after_minutes: i64,
}

impl MatchWindow {
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn before(&self) -> Duration {
        Duration::try_minutes(self.before_minutes).unwrap_or(Duration::MAX)
    }

    pub fn after(&self) -> Duration {
        Duration::try_minutes(self.after_minutes).unwrap_or(Duration::MAX)
    }
}

impl Default for MatchWindow {
    fn default() -> Self {
        Self {
            before_minutes: 20,
            after_minutes: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub window: MatchWindow,
    /// Dotted paths into the raw record, e.g. `classWaterBean.operdate`.
    pub time_fields: Vec<String>,
    /// When set, a time-window hit alone is reported as a miss.
    pub require_name_match: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            window: MatchWindow::default(),
            time_fields: DEFAULT_TIME_FIELDS.iter().map(|f| f.to_string()).collect(),
            require_name_match: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub course: String,
    pub event_at: NaiveDateTime,
    pub room: Option<String>,
    pub matched: bool,
    pub kind: MatchKind,
    pub candidates: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl CheckOutcome {
    pub fn from_result(event: &ScheduledEvent, result: &MatchResult) -> Self {
        Self {
            course: event.course.clone(),
            event_at: event.start,
            room: event.room.clone(),
            matched: result.matched,
            kind: result.kind,
            candidates: result.candidates.iter().map(|c| c.to_string()).collect(),
            checked_at: Utc::now(),
        }
    }

    pub fn source_key(&self) -> String {
        format!("{}|{}", self.event_at.format(DISPLAY_FORMAT), self.course)
    }
}

#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub course: String,
    pub checks: usize,
    pub misses: usize,
    pub by_name: usize,
    pub by_window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_durations_saturate() {
        let window = MatchWindow {
            before_minutes: i64::MAX,
            after_minutes: 5,
        };
        assert_eq!(window.before(), Duration::MAX);
        assert_eq!(window.after(), Duration::minutes(5));
    }
}

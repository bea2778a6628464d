use crate::models::{MatchConfig, MatchKind, MatchResult, ScheduledEvent};
use crate::record::AttendanceRecord;
use crate::window;

/// Decide whether `event` was attended.
///
/// A record whose subject name or short name equals the course name settles
/// it outright. Failing that, any record checked in within the configured
/// window counts, and those records are returned as candidates. With
/// `require_name_match` set, window hits are still returned but the event is
/// reported as missed.
pub fn match_event(
    event: &ScheduledEvent,
    records: &[AttendanceRecord],
    config: &MatchConfig,
) -> MatchResult {
    if records.is_empty() {
        tracing::debug!(course = %event.course, "no attendance records to match");
        return MatchResult::miss();
    }

    if records.iter().any(|record| name_matches(event, record)) {
        tracing::debug!(course = %event.course, "matched by subject name");
        return MatchResult {
            matched: true,
            kind: MatchKind::Name,
            candidates: Vec::new(),
        };
    }

    let candidates = window::find_in_window(
        event.start,
        records,
        &config.window,
        config.time_fields.as_slice(),
    );

    if candidates.is_empty() {
        tracing::debug!(course = %event.course, "no record inside the time window");
        return MatchResult::miss();
    }

    if config.require_name_match {
        tracing::debug!(
            course = %event.course,
            candidates = candidates.len(),
            "time window hits ignored, name match required"
        );
        return MatchResult {
            matched: false,
            kind: MatchKind::None,
            candidates,
        };
    }

    tracing::debug!(
        course = %event.course,
        candidates = candidates.len(),
        "matched by time window"
    );
    MatchResult {
        matched: true,
        kind: MatchKind::TimeWindow,
        candidates,
    }
}

fn name_matches(event: &ScheduledEvent, record: &AttendanceRecord) -> bool {
    [record.subject_name(), record.subject_short_name()]
        .into_iter()
        .flatten()
        .any(|name| name == event.course)
}

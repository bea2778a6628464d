use chrono::{NaiveDateTime, TimeDelta};

use crate::models::{Candidate, MatchWindow};
use crate::record::AttendanceRecord;

/// Records whose resolved timestamp falls inside
/// `[event_time - before, event_time + after]`, closest first.
///
/// Each record is considered once, using the first of `time_fields` that
/// parses. Records without a usable timestamp are skipped.
pub fn find_in_window<S: AsRef<str>>(
    event_time: NaiveDateTime,
    records: &[AttendanceRecord],
    window: &MatchWindow,
    time_fields: &[S],
) -> Vec<Candidate> {
    let earliest = event_time
        .checked_sub_signed(window.before())
        .unwrap_or(NaiveDateTime::MIN);
    let latest = event_time
        .checked_add_signed(window.after())
        .unwrap_or(NaiveDateTime::MAX);

    let mut hits: Vec<(TimeDelta, Candidate)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Some(timestamp) = record.timestamp(time_fields) else {
            tracing::trace!(index, "record has no usable timestamp, skipping");
            continue;
        };

        if timestamp < earliest || timestamp > latest {
            continue;
        }

        let distance = timestamp.signed_duration_since(event_time).abs();
        hits.push((
            distance,
            Candidate {
                timestamp,
                subject: record.display_subject().to_string(),
                teacher: record.teacher().unwrap_or_default(),
                room: record.room().map(str::to_string),
            },
        ));
    }

    // sort_by_key is stable, so equal distances keep input order
    hits.sort_by_key(|(distance, _)| *distance);
    hits.into_iter().map(|(_, candidate)| candidate).collect()
}

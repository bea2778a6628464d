use std::fmt::Write;

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{CheckOutcome, CourseSummary, MatchKind, MatchResult, ScheduledEvent, DISPLAY_FORMAT};

/// Start of the reporting window; very large spans clamp to `NaiveDate::MIN`.
pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Duration::try_days(since_days.max(1))
        .and_then(|span| Utc::now().date_naive().checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Text handed to the mailer when a slot has no check-in. `None` when the
/// event counts as attended.
pub fn render_notice(event: &ScheduledEvent, result: &MatchResult) -> Option<String> {
    if result.matched {
        return None;
    }

    let mut output = String::new();
    let _ = writeln!(
        output,
        "Attendance missing for {} on {}",
        event.course,
        event.start.date()
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Class starting at {} ({}) has no check-in record.",
        event.start.format(DISPLAY_FORMAT),
        event.room.as_deref().unwrap_or("room unknown")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Candidates:");

    if result.candidates.is_empty() {
        let _ = writeln!(output, "(none)");
    } else {
        for candidate in &result.candidates {
            let _ = writeln!(output, "- {candidate}");
        }
    }

    Some(output)
}

pub fn summarize_by_course(outcomes: &[CheckOutcome]) -> Vec<CourseSummary> {
    let mut map: std::collections::HashMap<String, CourseSummary> =
        std::collections::HashMap::new();

    for outcome in outcomes {
        let entry = map
            .entry(outcome.course.clone())
            .or_insert_with(|| CourseSummary {
                course: outcome.course.clone(),
                checks: 0,
                misses: 0,
                by_name: 0,
                by_window: 0,
            });

        entry.checks += 1;
        if !outcome.matched {
            entry.misses += 1;
            continue;
        }
        match outcome.kind {
            MatchKind::Name => entry.by_name += 1,
            MatchKind::TimeWindow => entry.by_window += 1,
            MatchKind::None => {}
        }
    }

    let mut summaries: Vec<CourseSummary> = map.into_values().collect();
    summaries.sort_by(|a, b| {
        b.misses
            .cmp(&a.misses)
            .then_with(|| a.course.cmp(&b.course))
    });
    summaries
}

pub fn build_report(
    course: Option<&str>,
    since_days: i64,
    cutoff: NaiveDate,
    outcomes: &[CheckOutcome],
) -> String {
    let summaries = summarize_by_course(outcomes);

    let mut output = String::new();
    let course_label = course.unwrap_or("all courses");

    let _ = writeln!(output, "# Attendance Check Report");
    let _ = writeln!(
        output,
        "Generated for {} over the last {} days (classes since {})",
        course_label,
        since_days.max(1),
        cutoff
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");

    if summaries.is_empty() {
        let _ = writeln!(output, "No checks recorded for this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} checks, {} missed ({} by name, {} by time window)",
                summary.course, summary.checks, summary.misses, summary.by_name, summary.by_window
            );
        }
    }

    let mut recent = outcomes.to_vec();
    recent.sort_by(|a, b| b.event_at.cmp(&a.event_at));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Missed Classes");
    let misses: Vec<&CheckOutcome> = recent.iter().filter(|o| !o.matched).collect();

    if misses.is_empty() {
        let _ = writeln!(output, "No missed classes in this window.");
    } else {
        for outcome in misses.iter().take(10) {
            write_outcome(&mut output, outcome);
        }
    }

    // Matched without a subject name, worth a manual look.
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attended By Time Window Only");
    let window_only: Vec<&CheckOutcome> = recent
        .iter()
        .filter(|o| o.matched && o.kind == MatchKind::TimeWindow)
        .collect();

    if window_only.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for outcome in window_only.iter().take(10) {
            write_outcome(&mut output, outcome);
        }
    }

    output
}

fn write_outcome(output: &mut String, outcome: &CheckOutcome) {
    let _ = writeln!(
        output,
        "- {} at {}{}",
        outcome.course,
        outcome.event_at.format(DISPLAY_FORMAT),
        outcome
            .room
            .as_deref()
            .map(|room| format!(" ({room})"))
            .unwrap_or_default()
    );
    for candidate in &outcome.candidates {
        let _ = writeln!(output, "  - {candidate}");
    }
}

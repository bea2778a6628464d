use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::ScheduledEvent;
use crate::record::parse_timestamp;

/// Load a schedule file. `.csv` files use the `course,start,room` layout;
/// anything else is read as weekly JSON.
pub fn load_schedule(path: &Path) -> anyhow::Result<Vec<ScheduledEvent>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let mut events = if is_csv {
        load_csv(path)?
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schedule {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("schedule {} is not valid JSON", path.display()))?;
        parse_weekly(&value)?
    };

    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.course.cmp(&b.course)));
    tracing::info!(count = events.len(), path = %path.display(), "loaded schedule");
    Ok(events)
}

/// Parse the weekly layout: `{"2025-11-11 14:00:00": ["Math", {"course": "Physics", "room": "A101"}]}`.
pub fn parse_weekly(value: &Value) -> anyhow::Result<Vec<ScheduledEvent>> {
    let slots = value
        .as_object()
        .ok_or_else(|| anyhow!("weekly schedule must be a JSON object keyed by start time"))?;

    let mut events = Vec::new();
    for (key, entries) in slots {
        let Some(start) = parse_timestamp(key) else {
            tracing::warn!(key = %key, "unrecognised start time in schedule, skipping");
            continue;
        };
        let Some(entries) = entries.as_array() else {
            tracing::warn!(key = %key, "schedule slot is not a list, skipping");
            continue;
        };

        for entry in entries {
            match entry {
                Value::String(course) => events.push(ScheduledEvent {
                    course: course.clone(),
                    start,
                    room: None,
                }),
                Value::Object(fields) => {
                    let Some(course) = fields.get("course").and_then(Value::as_str) else {
                        tracing::warn!(key = %key, "schedule entry has no course name, skipping");
                        continue;
                    };
                    events.push(ScheduledEvent {
                        course: course.to_string(),
                        start,
                        room: fields
                            .get("room")
                            .and_then(Value::as_str)
                            .filter(|room| !room.is_empty())
                            .map(str::to_string),
                    });
                }
                other => {
                    tracing::warn!(key = %key, entry = %other, "unexpected schedule entry, skipping");
                }
            }
        }
    }

    Ok(events)
}

fn load_csv(path: &Path) -> anyhow::Result<Vec<ScheduledEvent>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course: String,
        start: String,
        #[serde(default)]
        room: Option<String>,
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open schedule {}", path.display()))?;
    let mut events = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid schedule row {}", index + 1))?;
        let start = parse_timestamp(&row.start)
            .ok_or_else(|| anyhow!("row {}: unrecognised start time {:?}", index + 1, row.start))?;
        events.push(ScheduledEvent {
            course: row.course,
            start,
            room: row.room.filter(|room| !room.is_empty()),
        });
    }

    Ok(events)
}

/// Narrow the schedule to one slot, or to one day, or leave it whole.
pub fn select_events(
    events: &[ScheduledEvent],
    at: Option<NaiveDateTime>,
    date: Option<NaiveDate>,
) -> Vec<ScheduledEvent> {
    events
        .iter()
        .filter(|event| match (at, date) {
            (Some(at), _) => event.start == at,
            (None, Some(date)) => event.start.date() == date,
            (None, None) => true,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn at(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).expect("valid test timestamp")
    }

    #[test]
    fn parses_weekly_strings_and_objects() {
        let weekly = json!({
            "2025-11-11 14:00:00": ["高等数学(一)", {"course": "线性代数", "room": "教1楼-东201"}],
            "2025-11-11 08:00:00": [{"course": "English", "room": null}]
        });

        let events = parse_weekly(&weekly).unwrap();
        assert_eq!(events.len(), 3);
        let linear = events.iter().find(|e| e.course == "线性代数").unwrap();
        assert_eq!(linear.room.as_deref(), Some("教1楼-东201"));
        assert_eq!(linear.start, at("2025-11-11 14:00:00"));
        let english = events.iter().find(|e| e.course == "English").unwrap();
        assert_eq!(english.room, None);
    }

    #[test]
    fn skips_malformed_weekly_slots() {
        let weekly = json!({
            "next tuesday": ["Math"],
            "2025-11-11 10:00:00": "Math",
            "2025-11-11 12:00:00": [42, {"room": "A1"}, "Physics"]
        });

        let events = parse_weekly(&weekly).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].course, "Physics");
    }

    #[test]
    fn rejects_non_object_weekly() {
        assert!(parse_weekly(&json!(["Math"])).is_err());
    }

    #[test]
    fn loads_weekly_json_sorted() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"2025-11-12 08:00:00": ["B"], "2025-11-11 08:00:00": ["A"]}}"#
        )
        .unwrap();

        let events = load_schedule(file.path()).unwrap();
        let courses: Vec<_> = events.iter().map(|e| e.course.as_str()).collect();
        assert_eq!(courses, vec!["A", "B"]);
    }

    #[test]
    fn loads_csv_schedule() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "course,start,room").unwrap();
        writeln!(file, "Physics,2025-11-11 16:00:00,").unwrap();
        writeln!(file, "Math,2025-11-11T14:00:00,A101").unwrap();

        let events = load_schedule(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].course, "Math");
        assert_eq!(events[0].room.as_deref(), Some("A101"));
        assert_eq!(events[1].room, None);
    }

    #[test]
    fn csv_with_bad_time_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "course,start,room").unwrap();
        writeln!(file, "Math,tomorrow,A101").unwrap();

        assert!(load_schedule(file.path()).is_err());
    }

    #[test]
    fn selects_by_slot_or_day() {
        let events = vec![
            ScheduledEvent {
                course: "Math".to_string(),
                start: at("2025-11-11 14:00:00"),
                room: None,
            },
            ScheduledEvent {
                course: "Physics".to_string(),
                start: at("2025-11-11 16:00:00"),
                room: None,
            },
            ScheduledEvent {
                course: "Chem".to_string(),
                start: at("2025-11-12 08:00:00"),
                room: None,
            },
        ];

        let slot = select_events(&events, Some(at("2025-11-11 16:00:00")), None);
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].course, "Physics");

        let day = select_events(&events, None, NaiveDate::from_ymd_opt(2025, 11, 11));
        assert_eq!(day.len(), 2);

        assert_eq!(select_events(&events, None, None).len(), 3);
    }
}

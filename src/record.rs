use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// One raw check-in entry as returned by the attendance API.
///
/// No schema is assumed: every accessor resolves to `None` when the field is
/// missing, has the wrong type, or is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AttendanceRecord(Map<String, Value>);

impl AttendanceRecord {
    /// Walk a dotted path such as `subjectBean.sName`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.lookup(path)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.text("subjectBean.sName")
    }

    pub fn subject_short_name(&self) -> Option<&str> {
        self.text("subjectBean.sSimple")
    }

    /// Name used for display: the full name, else the short name.
    pub fn display_subject(&self) -> &str {
        self.subject_name()
            .or_else(|| self.subject_short_name())
            .unwrap_or_default()
    }

    pub fn teacher(&self) -> Option<String> {
        if let Some(value) = self.lookup("teachNameList") {
            match value {
                Value::String(name) if !name.is_empty() => return Some(name.clone()),
                Value::Array(names) => {
                    let joined = names
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|name| !name.is_empty())
                        .collect::<Vec<_>>()
                        .join(", ");
                    if !joined.is_empty() {
                        return Some(joined);
                    }
                }
                _ => {}
            }
        }
        self.text("teacher").map(str::to_string)
    }

    pub fn room(&self) -> Option<&str> {
        self.text("roomBean.roomnum")
            .or_else(|| self.text("classWaterBean.roomBean.roomnum"))
    }

    /// First field in `fields` that is present and parses as a timestamp.
    pub fn timestamp<S: AsRef<str>>(&self, fields: &[S]) -> Option<NaiveDateTime> {
        fields
            .iter()
            .filter_map(|field| self.text(field.as_ref()))
            .find_map(parse_timestamp)
    }
}

impl From<Map<String, Value>> for AttendanceRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

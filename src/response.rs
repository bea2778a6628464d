use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::record::AttendanceRecord;

const ENVELOPES: [&str; 2] = ["data", "result"];
const LIST_KEYS: [&str; 2] = ["list", "records"];

/// Pull the attendance records out of an API response envelope.
///
/// Unrecognised shapes give an empty list; entries that are not JSON objects
/// are dropped.
pub fn extract_records(response: &Value) -> Vec<AttendanceRecord> {
    let Some(list) = locate_list(response) else {
        tracing::debug!("response has no recognisable record list");
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| item.as_object().cloned().map(AttendanceRecord::from))
        .collect()
}

fn locate_list(response: &Value) -> Option<&Vec<Value>> {
    if let Some(list) = response.as_array() {
        return Some(list);
    }

    let object = response.as_object()?;
    for envelope in ENVELOPES {
        match object.get(envelope) {
            Some(Value::Array(list)) => return Some(list),
            Some(Value::Object(inner)) => {
                if let Some(list) = LIST_KEYS
                    .iter()
                    .find_map(|key| inner.get(*key).and_then(Value::as_array))
                {
                    return Some(list);
                }
            }
            _ => {}
        }
    }

    LIST_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
}

pub fn load_response(path: &Path) -> anyhow::Result<Vec<AttendanceRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read response file {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("response file {} is not valid JSON", path.display()))?;
    let records = extract_records(&value);
    tracing::info!(count = records.len(), path = %path.display(), "loaded attendance records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn reads_data_list_envelope() {
        let response = json!({
            "code": 200,
            "data": {"list": [{"operdate": "2025-11-11 13:45:00"}, {"operdate": "2025-11-11 14:01:00"}]}
        });
        assert_eq!(extract_records(&response).len(), 2);
    }

    #[test]
    fn falls_back_through_known_shapes() {
        assert_eq!(extract_records(&json!({"data": {"records": [{}]}})).len(), 1);
        assert_eq!(extract_records(&json!({"result": {"list": [{}, {}]}})).len(), 2);
        assert_eq!(extract_records(&json!({"data": [{}, {}, {}]})).len(), 3);
        assert_eq!(extract_records(&json!({"list": [{}]})).len(), 1);
        assert_eq!(extract_records(&json!([{}, {}])).len(), 2);
    }

    #[test]
    fn empty_data_does_not_hide_result() {
        let response = json!({"data": {}, "result": {"list": [{"operdate": "x"}]}});
        assert_eq!(extract_records(&response).len(), 1);
    }

    #[test]
    fn unknown_shapes_yield_nothing() {
        assert!(extract_records(&json!({"code": 400, "msg": "token expired"})).is_empty());
        assert!(extract_records(&json!("plain text")).is_empty());
        assert!(extract_records(&json!({"data": {"list": "nope"}})).is_empty());
    }

    #[test]
    fn drops_non_object_entries() {
        let response = json!({"data": {"list": [{"operdate": "2025-11-11 13:45:00"}, 7, null, "x"]}});
        assert_eq!(extract_records(&response).len(), 1);
    }

    #[test]
    fn loads_saved_response_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data": {{"list": [{{"subjectBean": {{"sName": "Math"}}}}]}}}}"#
        )
        .unwrap();

        let records = load_response(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_name(), Some("Math"));
    }

    #[test]
    fn reports_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html>502</html>").unwrap();
        assert!(load_response(file.path()).is_err());
    }
}

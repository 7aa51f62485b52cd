//! Unwraps the many result shapes the extraction API returns into one
//! flat field map.

use serde_json::{Map, Value};

use super::types::NormalizedResult;

/// Keys checked, in order, for an object holding the extracted fields.
const OBJECT_CONTAINER_KEYS: [&str; 5] = ["data", "result", "extracted", "fields", "output"];

/// Keys checked, in order, for a list of extracted records.
const LIST_CONTAINER_KEYS: [&str; 3] = ["data", "result", "records"];

pub const RECORDS_KEY: &str = "records";
pub const RAW_KEY: &str = "_raw";

/// Normalize a terminal result payload.
///
/// The first object-valued container key wins and is returned as-is. Failing
/// that, the first list-valued container is wrapped as `{"records": [...]}`.
/// Anything else is kept whole under `_raw`, so no shape is dropped.
pub fn normalize_result(payload: Value) -> NormalizedResult {
    let mut map = match payload {
        Value::Object(map) => map,
        other => return single_entry(RAW_KEY, other),
    };

    let object_key = OBJECT_CONTAINER_KEYS
        .into_iter()
        .find(|key| map.get(*key).is_some_and(Value::is_object));
    if let Some(Value::Object(fields)) = object_key.and_then(|key| map.remove(key)) {
        return fields;
    }

    let list_key = LIST_CONTAINER_KEYS
        .into_iter()
        .find(|key| map.get(*key).is_some_and(Value::is_array));
    if let Some(records) = list_key.and_then(|key| map.remove(key)) {
        return single_entry(RECORDS_KEY, records);
    }

    single_entry(RAW_KEY, Value::Object(map))
}

fn single_entry(key: &str, value: Value) -> NormalizedResult {
    let mut out = Map::new();
    out.insert(key.to_string(), value);
    out
}

// src/report/marshal.rs
// =============================================================================
// JSON encoding for records and diagnostics that never fails.
//
// serde_json can refuse some values (a map with non-string keys, a custom
// Serialize impl that errors). On error we fall back to a small JSON object
// holding the error text and an escaped Debug rendering of the value.
// =============================================================================

use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;

pub fn to_json_line<T: Serialize + Debug>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(line) => line,
        Err(e) => {
            // Building a Value from plain strings cannot fail, and neither can
            // printing it
            json!({
                "marshal_error": e.to_string(),
                "value": format!("{:?}", value),
            })
            .to_string()
        }
    }
}

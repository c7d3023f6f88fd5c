use serde_json::Value;

use crate::utils::truncate_with_marker;

/// Upper bound on the summary string handed back to the model on success
///.
pub const LLM_SUMMARY_CAP: usize = 500;

/// Upper bound on the summary string handed back to the model on error, and
/// on non-JSON response bodies recorded for the Executor's own use.
pub const ERR_CAP: usize = 2048;

/// Build the bounded string the model sees for a successful (2xx) response.
/// The full body still goes to the ActionRecord/UI untouched — only this
/// return value is capped.
pub fn summarize_success(body: &Value) -> String {
    let summary = match body {
        Value::Object(map) => {
            if let Some(items) = first_list_field(map) {
                summarize_list(map, items)
            } else if map.contains_key("id") {
                summarize_single_object(map)
            } else if map.len() <= 5 {
                format!("Success: {{{}}}", map.keys().cloned().collect::<Vec<_>>().join(", "))
            } else {
                format!("Success: object with {} fields", map.len())
            }
        }
        _ => "Success".to_string(),
    };
    truncate_with_marker(&summary, LLM_SUMMARY_CAP)
}

pub fn summarize_error(status: u16, body: &str) -> String {
    let capped = truncate_with_marker(body, ERR_CAP);
    format!("HTTP {status} Error:\n{capped}")
}

const LIST_FIELD_NAMES: &[&str] = &["data", "results", "items", "records", "entries", "list", "rows", "objects"];

fn first_list_field<'a>(map: &'a serde_json::Map<String, Value>) -> Option<&'a Vec<Value>> {
    LIST_FIELD_NAMES
        .iter()
        .find_map(|name| map.get(*name).and_then(Value::as_array))
}

fn summarize_list(map: &serde_json::Map<String, Value>, items: &[Value]) -> String {
    let n = items.len();
    let has_more = map.get("has_more").and_then(Value::as_bool).unwrap_or(false);
    let has_more_clause = if has_more { "; has_more: true" } else { "" };

    let first_clause = items
        .first()
        .and_then(Value::as_object)
        .map(|first| {
            let id = first.get("id").and_then(Value::as_str).unwrap_or("?");
            let object = first.get("object").and_then(Value::as_str).unwrap_or("item");
            let label = first
                .get("name")
                .or_else(|| first.get("email"))
                .or_else(|| first.get("description"))
                .and_then(Value::as_str)
                .unwrap_or("");
            format!(". First: {id} ({object}: {label})")
        })
        .unwrap_or_default();

    format!("Success: {n} items returned{has_more_clause}{first_clause}")
}

fn summarize_single_object(map: &serde_json::Map<String, Value>) -> String {
    let id = map.get("id").and_then(Value::as_str).unwrap_or("?");
    let kind = map
        .get("object")
        .or_else(|| map.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("object");
    let label = map
        .get("name")
        .or_else(|| map.get("email"))
        .or_else(|| map.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("");
    format!("Success: {kind} {id} ({label})")
}

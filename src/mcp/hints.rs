use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `list_expansion` hint: default values merged into a tool
/// call's arguments, gated by a glob match against the tool name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExpansionHint {
    /// e.g. `"list_*"` — only a single trailing `*` is supported.
    pub tool_name_glob: String,
    pub defaults: Value,
}

/// Template-level argument/response rewriting for an MCP-backed Source
///. A Source's `templateRef` points at the
/// catalog entry these hints came from; this type only models the hints
/// themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeHints {
    #[serde(default)]
    pub list_expansion: Option<ListExpansionHint>,
    /// Companion tool name that fetches full objects when a thin result is seen.
    #[serde(default)]
    pub fetch_enrichment: Option<String>,
    /// Prose appended to the model's system prompt.
    #[serde(default)]
    pub llm_guidance: Option<String>,
    #[serde(default)]
    pub unwrap_data: bool,
    #[serde(default)]
    pub detect_thin: bool,
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// An array of objects each shaped exactly `{"id": ...}` — a thin-result
/// shape that warrants a warning instead of failing.
fn is_thin_list(body: &Value) -> bool {
    let Some(arr) = body.as_array() else { return false };
    !arr.is_empty()
        && arr.iter().all(|item| {
            item.as_object()
                .map(|o| o.len() == 1 && o.contains_key("id"))
                .unwrap_or(false)
        })
}

impl RuntimeHints {
    /// `preProcessArgs`: merge `list_expansion` defaults into `args` without
    /// overriding anything the caller already set, when `tool_name` matches
    /// the hint's glob.
    pub fn pre_process_args(&self, tool_name: &str, mut args: Value) -> Value {
        if let Some(hint) = &self.list_expansion {
            if glob_matches(&hint.tool_name_glob, tool_name) {
                if let (Some(obj), Some(defaults)) = (args.as_object_mut(), hint.defaults.as_object()) {
                    for (k, v) in defaults {
                        obj.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
            }
        }
        args
    }

    /// `postProcessResult`: optionally unwrap `body.data`, then flag thin
    /// results. Returns the (possibly unwrapped) body plus a warning
    /// message when the result looks thin — this never fails the call
    ///.
    pub fn post_process_result(&self, body: Value) -> (Value, Option<String>) {
        let body = if self.unwrap_data {
            body.get("data").cloned().unwrap_or(body)
        } else {
            body
        };

        let warning = if self.detect_thin && is_thin_list(&body) {
            let mut msg = "MCP result looks thin (objects carry only an id field)".to_string();
            if let Some(companion) = &self.fetch_enrichment {
                msg.push_str(&format!("; consider expanding via '{companion}'"));
            }
            Some(msg)
        } else {
            None
        };

        (body, warning)
    }
}

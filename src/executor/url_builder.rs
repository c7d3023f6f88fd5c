use serde_json::Value;

use crate::model::{ParamLocation, ParameterSchema};

/// Build the dispatch URL: substitute `{name}` path
/// placeholders from `in=path` args, append remaining `in=query` args as a
/// stable-sorted query string, and join base+path with exactly one `/`.
/// `ParameterSchema` is a `BTreeMap`, so query pairs are already emitted in
/// deterministic key order.
pub fn build_url(base_url: &str, path: &str, schema: &ParameterSchema, cleaned_args: &Value) -> String {
    let mut resolved_path = path.to_string();
    let mut query_pairs: Vec<(String, String)> = Vec::new();

    for (name, spec) in schema {
        let Some(value) = cleaned_args.get(name) else {
            continue;
        };
        let rendered = render_scalar(value);
        match spec.location {
            ParamLocation::Path => {
                let placeholder = format!("{{{name}}}");
                resolved_path = resolved_path.replace(&placeholder, &urlencoding::encode(&rendered));
            }
            ParamLocation::Query => {
                query_pairs.push((name.clone(), rendered));
            }
            ParamLocation::Body => {}
        }
    }

    let base = base_url.trim_end_matches('/');
    let path = resolved_path.trim_start_matches('/');
    let mut url = format!("{base}/{path}");

    if !query_pairs.is_empty() {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &query_pairs {
            serializer.append_pair(k, v);
        }
        url.push('?');
        url.push_str(&serializer.finish());
    }

    url
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the request body object: if `requestBodySchema`
/// names properties, collect only those keys; otherwise collect every arg
/// not claimed by a path/query parameter. An empty result means "no body".
pub fn build_body(
    cleaned_args: &Value,
    schema: &ParameterSchema,
    request_body_schema: Option<&Value>,
) -> Option<Value> {
    let Some(args_map) = cleaned_args.as_object() else {
        return None;
    };

    let body_map: serde_json::Map<String, Value> = if let Some(body_schema) = request_body_schema {
        let allowed_keys: Vec<&str> = body_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default();
        args_map
            .iter()
            .filter(|(k, _)| allowed_keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        args_map
            .iter()
            .filter(|(k, _)| !schema.contains_key(k.as_str()) || is_body_param(schema, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };

    if body_map.is_empty() {
        None
    } else {
        Some(Value::Object(body_map))
    }
}

fn is_body_param(schema: &ParameterSchema, key: &str) -> bool {
    matches!(schema.get(key).map(|s| s.location), Some(ParamLocation::Body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamSpec;
    use serde_json::json;

    fn schema_with(entries: &[(&str, ParamLocation)]) -> ParameterSchema {
        entries
            .iter()
            .map(|(name, loc)| {
                (
                    name.to_string(),
                    ParamSpec {
                        location: *loc,
                        schema: json!({"type": "string"}),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn substitutes_path_placeholder_and_encodes() {
        let schema = schema_with(&[("id", ParamLocation::Path)]);
        let url = build_url(
            "https://api.example.com",
            "/users/{id}",
            &schema,
            &json!({"id": "a b"}),
        );
        assert_eq!(url, "https://api.example.com/users/a%20b");
    }

    #[test]
    fn query_params_stable_sorted() {
        let schema = schema_with(&[("z", ParamLocation::Query), ("a", ParamLocation::Query)]);
        let url = build_url(
            "https://api.example.com",
            "/search",
            &schema,
            &json!({"z": "1", "a": "2"}),
        );
        assert_eq!(url, "https://api.example.com/search?a=2&z=1");
    }

    #[test]
    fn exactly_one_slash_joins_base_and_path() {
        let schema = ParameterSchema::new();
        let url = build_url("https://api.example.com/", "/v1/things", &schema, &json!({}));
        assert_eq!(url, "https://api.example.com/v1/things");
    }

    #[test]
    fn body_excludes_path_and_query_params() {
        let schema = schema_with(&[("id", ParamLocation::Path), ("limit", ParamLocation::Query)]);
        let body = build_body(&json!({"id": "x", "limit": "10", "name": "Bob"}), &schema, None);
        assert_eq!(body, Some(json!({"name": "Bob"})));
    }

    #[test]
    fn body_schema_restricts_to_named_keys() {
        let schema = ParameterSchema::new();
        let body_schema = json!({"properties": {"name": {"type": "string"}}});
        let body = build_body(
            &json!({"name": "Bob", "extra": "ignored"}),
            &schema,
            Some(&body_schema),
        );
        assert_eq!(body, Some(json!({"name": "Bob"})));
    }

    #[test]
    fn empty_body_is_none() {
        let schema = schema_with(&[("id", ParamLocation::Path)]);
        let body = build_body(&json!({"id": "x"}), &schema, None);
        assert_eq!(body, None);
    }
}

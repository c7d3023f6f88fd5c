use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{BrokerError, BrokerResult};
use crate::model::{Method, Operation, ParamLocation, ParamSpec};

use super::risk::classify;

const HTTP_METHODS: &[(&str, Method)] = &[
    ("get", Method::Get),
    ("post", Method::Post),
    ("put", Method::Put),
    ("patch", Method::Patch),
    ("delete", Method::Delete),
    ("head", Method::Head),
    ("options", Method::Options),
];

/// Parse an OpenAPI document into normalized Operations.
/// Every `(path, method)` pair in `paths` becomes one Operation. Anything
/// that doesn't look like an OpenAPI document (no object-shaped `paths`)
/// is rejected with `invalid_spec`.
pub fn parse_openapi(source_id: Uuid, doc: &Value) -> BrokerResult<Vec<Operation>> {
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| BrokerError::InvalidSpec("missing or non-object 'paths'".into()))?;

    let mut operations = Vec::new();

    for (path, path_item) in paths {
        let Some(path_item) = path_item.as_object() else {
            continue;
        };

        let shared_params = path_item
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (method_str, method) in HTTP_METHODS {
            let Some(op_obj) = path_item.get(*method_str).and_then(Value::as_object) else {
                continue;
            };

            let operation_id = op_obj
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{method_str}_{}", sanitize_path(path)));

            let display_name = operation_id.clone();
            let description = op_obj
                .get("description")
                .or_else(|| op_obj.get("summary"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let mut own_params = op_obj
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut all_params = shared_params.clone();
            all_params.append(&mut own_params);

            let parameter_schema = build_parameter_schema(&all_params);

            let request_body_schema = op_obj
                .get("requestBody")
                .and_then(|rb| rb.get("content"))
                .and_then(|c| c.get("application/json"))
                .and_then(|j| j.get("schema"))
                .cloned();

            let tags = op_obj
                .get("tags")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let risk_level = classify(&display_name, &description);

            let operation = Operation {
                id: Uuid::new_v4(),
                source_id,
                operation_id,
                display_name,
                description,
                method: *method,
                path: path.clone(),
                mcp_tool_name: None,
                parameter_schema,
                request_body_schema,
                risk_level,
                requires_confirmation: risk_level == crate::model::RiskLevel::Dangerous,
                tags,
                embedding: None,
            };
            operation
                .validate()
                .map_err(BrokerError::InvalidSpec)?;
            operations.push(operation);
        }
    }

    Ok(operations)
}

fn sanitize_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

fn build_parameter_schema(params: &[Value]) -> BTreeMap<String, ParamSpec> {
    let mut schema = BTreeMap::new();
    for param in params {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let location = match param.get("in").and_then(Value::as_str) {
            Some("path") => ParamLocation::Path,
            Some("query") => ParamLocation::Query,
            _ => continue,
        };
        let param_schema = param
            .get("schema")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "string"}));
        schema.insert(
            name.to_string(),
            ParamSpec {
                location,
                schema: param_schema,
            },
        );
    }
    schema
}

use serde_json::{Value, json};

use crate::model::{Operation, ParamLocation};

/// Build the `{name, description, parameters}` JSON-Schema payload an
/// OpenAI-compatible provider needs for function-calling, folding
/// `parameterSchema` (path/query) and `requestBodySchema` (body) into one
/// flat object — the wire protocol doesn't distinguish where an argument
/// ends up, only the Executor's `buildUrl`/`buildRequestBody` split does.
pub fn operation_json_schema(op: &Operation) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required: Vec<Value> = Vec::new();

    for (name, spec) in &op.parameter_schema {
        properties.insert(name.clone(), spec.schema.clone());
        if spec.location == ParamLocation::Path {
            required.push(Value::String(name.clone()));
        }
    }

    if let Some(body_schema) = &op.request_body_schema {
        if let Some(body_props) = body_schema.get("properties").and_then(Value::as_object) {
            for (k, v) in body_props {
                properties.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        if let Some(body_required) = body_schema.get("required").and_then(Value::as_array) {
            for r in body_required {
                if !required.contains(r) {
                    required.push(r.clone());
                }
            }
        }
    }

    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

/// Validate a tool call's arguments against the Operation's combined schema
/// before dispatch — rejecting a malformed call here is far cheaper than
/// letting it reach an upstream and surface as an opaque transport error.
pub fn validate_args(op: &Operation, args: &Value) -> Result<(), String> {
    let schema = operation_json_schema(op);
    let validator = jsonschema::validator_for(&schema).map_err(|e| format!("invalid operation schema for '{}': {e}", op.operation_id))?;
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if errors.is_empty() { Ok(()) } else { Err(errors.join("; ")) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Method, ParamSpec, ParameterSchema, RiskLevel};
    use uuid::Uuid;

    fn op_with(schema: ParameterSchema, body: Option<Value>) -> Operation {
        Operation {
            id: Uuid::nil(),
            source_id: Uuid::nil(),
            operation_id: "create_charge".into(),
            display_name: "Create Charge".into(),
            description: "charge a customer".into(),
            method: Method::Post,
            path: "/v1/charges".into(),
            mcp_tool_name: None,
            parameter_schema: schema,
            request_body_schema: body,
            risk_level: RiskLevel::Moderate,
            requires_confirmation: false,
            tags: vec![],
            embedding: None,
        }
    }

    #[test]
    fn path_param_becomes_required() {
        let mut schema = ParameterSchema::new();
        schema.insert("id".into(), ParamSpec { location: ParamLocation::Path, schema: json!({"type": "string"}) });
        let op = op_with(schema, None);
        let s = operation_json_schema(&op);
        assert_eq!(s["required"], json!(["id"]));
        assert_eq!(s["properties"]["id"], json!({"type": "string"}));
    }

    #[test]
    fn body_schema_properties_are_merged() {
        let op = op_with(
            ParameterSchema::new(),
            Some(json!({"type": "object", "properties": {"amount": {"type": "integer"}}, "required": ["amount"]})),
        );
        let s = operation_json_schema(&op);
        assert_eq!(s["properties"]["amount"], json!({"type": "integer"}));
        assert_eq!(s["required"], json!(["amount"]));
    }

    #[test]
    fn valid_args_pass() {
        let op = op_with(ParameterSchema::new(), Some(json!({"type": "object", "properties": {"amount": {"type": "integer"}}})));
        assert!(validate_args(&op, &json!({"amount": 500})).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let op = op_with(ParameterSchema::new(), Some(json!({"type": "object", "properties": {"amount": {"type": "integer"}}})));
        assert!(validate_args(&op, &json!({"amount": "not a number"})).is_err());
    }
}

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{BrokerError, BrokerResult};
use crate::model::{Method, Operation, ParamLocation, ParamSpec, RiskLevel};

use super::risk::classify;

/// One discovered MCP tool, shaped like `rmcp`'s `Tool` (name, description,
/// `input_schema`) so callers can feed results straight from a live
/// `list_tools` call without reaching into the transport layer here.
#[derive(Debug, Clone)]
pub struct McpToolListing {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Parse an MCP `list_tools` response into normalized Operations.
/// One Operation per tool; `parameterSchema` comes from the tool's
/// JSON-Schema `inputSchema`, with properties default-typed to string when
/// a nested `type` is missing.
pub fn parse_mcp_tools(source_id: Uuid, tools: &[McpToolListing]) -> BrokerResult<Vec<Operation>> {
    if tools.is_empty() {
        return Err(BrokerError::InvalidSpec(
            "MCP tool listing is empty".into(),
        ));
    }

    let mut operations = Vec::with_capacity(tools.len());
    for tool in tools {
        let parameter_schema = schema_properties_to_params(&tool.input_schema);
        let risk_level = classify(&tool.name, &tool.description);

        let operation = Operation {
            id: Uuid::new_v4(),
            source_id,
            operation_id: tool.name.clone(),
            display_name: tool.name.clone(),
            description: tool.description.clone(),
            method: Method::Mcp,
            path: String::new(),
            mcp_tool_name: Some(tool.name.clone()),
            parameter_schema,
            request_body_schema: None,
            risk_level,
            requires_confirmation: risk_level == RiskLevel::Dangerous,
            tags: Vec::new(),
            embedding: None,
        };
        operation.validate().map_err(BrokerError::InvalidSpec)?;
        operations.push(operation);
    }

    Ok(operations)
}

fn schema_properties_to_params(input_schema: &Value) -> BTreeMap<String, ParamSpec> {
    let mut schema = BTreeMap::new();
    let Some(props) = input_schema.get("properties").and_then(Value::as_object) else {
        return schema;
    };
    for (name, prop_schema) in props {
        let mut prop_schema = prop_schema.clone();
        if prop_schema.get("type").is_none() {
            if let Value::Object(map) = &mut prop_schema {
                map.insert("type".to_string(), Value::String("string".to_string()));
            }
        }
        schema.insert(
            name.clone(),
            ParamSpec {
                location: ParamLocation::Body,
                schema: prop_schema,
            },
        );
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Vec<McpToolListing> {
        vec![
            McpToolListing {
                name: "search_issues".into(),
                description: "Search issues by query".into(),
                input_schema: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
            },
            McpToolListing {
                name: "delete_issue".into(),
                description: "Permanently delete an issue".into(),
                input_schema: json!({"type": "object", "properties": {"id": {}}}),
            },
        ]
    }

    #[test]
    fn one_operation_per_tool() {
        let ops = parse_mcp_tools(Uuid::nil(), &listing()).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.method == Method::Mcp));
        assert!(ops.iter().all(|o| o.mcp_tool_name.is_some()));
    }

    #[test]
    fn missing_type_defaults_to_string() {
        let ops = parse_mcp_tools(Uuid::nil(), &listing()).unwrap();
        let delete_op = ops.iter().find(|o| o.operation_id == "delete_issue").unwrap();
        let id_schema = &delete_op.parameter_schema["id"].schema;
        assert_eq!(id_schema["type"], json!("string"));
    }

    #[test]
    fn risk_classified_from_name_and_description() {
        let ops = parse_mcp_tools(Uuid::nil(), &listing()).unwrap();
        let delete_op = ops.iter().find(|o| o.operation_id == "delete_issue").unwrap();
        assert_eq!(delete_op.risk_level, RiskLevel::Dangerous);
        assert!(delete_op.requires_confirmation);
    }

    #[test]
    fn empty_listing_is_invalid_spec() {
        let err = parse_mcp_tools(Uuid::nil(), &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_spec");
    }
}

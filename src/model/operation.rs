use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Mcp,
}

impl Method {
    /// `AgentSourceLink` invariant: `permission=read` exposes only these.
    pub fn is_read_only(self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }

    pub fn as_str(self) -> &'static str {
        method_token(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Dangerous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

/// One parameter's placement and JSON-Schema fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "in")]
    pub location: ParamLocation,
    /// JSON-Schema fragment for this property (type, description, enum, ...).
    pub schema: serde_json::Value,
}

/// `parameterSchema`: an ordered map of property name -> placement + schema.
/// `BTreeMap` keeps iteration order stable, which `buildUrl`'s query-string
/// assembly relies on directly.
pub type ParameterSchema = BTreeMap<String, ParamSpec>;

/// A callable API operation derived from a Source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub source_id: Uuid,
    /// Stable identifier independent of display name (OpenAPI `operationId`
    /// or the MCP tool name).
    pub operation_id: String,
    pub display_name: String,
    pub description: String,
    pub method: Method,
    /// HTTP path with `{placeholder}` segments, or the MCP tool name when
    /// `method == Mcp` (mirrored into `mcp_tool_name` too for clarity at
    /// call sites — invariant: `method=MCP ⇒ mcp_tool_name≠∅`).
    pub path: String,
    #[serde(default)]
    pub mcp_tool_name: Option<String>,
    pub parameter_schema: ParameterSchema,
    #[serde(default)]
    pub request_body_schema: Option<serde_json::Value>,
    pub risk_level: RiskLevel,
    pub requires_confirmation: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Either a 1536- or 768-wide embedding; only one deployment-wide width
    /// is ever populated.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Operation {
    /// Checks the two cross-field invariants an Operation must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.requires_confirmation && self.risk_level != RiskLevel::Dangerous {
            return Err(format!(
                "operation '{}': requiresConfirmation=true but riskLevel != dangerous",
                self.operation_id
            ));
        }
        if self.method == Method::Mcp && self.mcp_tool_name.as_deref().unwrap_or("").is_empty() {
            return Err(format!(
                "operation '{}': method=MCP requires a non-empty mcpToolName",
                self.operation_id
            ));
        }
        Ok(())
    }

    pub fn text_for_embedding(&self) -> String {
        format!(
            "{}: {} ({} {})",
            self.display_name,
            self.description,
            method_token(self.method),
            self.path
        )
    }
}

fn method_token(m: Method) -> &'static str {
    match m {
        Method::Get => "GET",
        Method::Post => "POST",
        Method::Put => "PUT",
        Method::Patch => "PATCH",
        Method::Delete => "DELETE",
        Method::Head => "HEAD",
        Method::Options => "OPTIONS",
        Method::Mcp => "MCP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_op() -> Operation {
        Operation {
            id: Uuid::nil(),
            source_id: Uuid::nil(),
            operation_id: "deleteUser".into(),
            display_name: "Delete User".into(),
            description: "Deletes a user account".into(),
            method: Method::Delete,
            path: "/users/{id}".into(),
            mcp_tool_name: None,
            parameter_schema: ParameterSchema::new(),
            request_body_schema: None,
            risk_level: RiskLevel::Dangerous,
            requires_confirmation: true,
            tags: vec![],
            embedding: None,
        }
    }

    #[test]
    fn valid_dangerous_confirmed_op_passes() {
        assert!(base_op().validate().is_ok());
    }

    #[test]
    fn requires_confirmation_without_dangerous_risk_is_invalid() {
        let mut op = base_op();
        op.risk_level = RiskLevel::Moderate;
        assert!(op.validate().is_err());
    }

    #[test]
    fn dangerous_without_confirmation_is_fine_converse_not_forced() {
        let mut op = base_op();
        op.requires_confirmation = false;
        assert!(op.validate().is_ok());
    }

    #[test]
    fn mcp_method_requires_tool_name() {
        let mut op = base_op();
        op.method = Method::Mcp;
        op.requires_confirmation = false;
        op.risk_level = RiskLevel::Safe;
        assert!(op.validate().is_err());
        op.mcp_tool_name = Some("list_items".into());
        assert!(op.validate().is_ok());
    }

    #[test]
    fn read_only_methods() {
        assert!(Method::Get.is_read_only());
        assert!(Method::Head.is_read_only());
        assert!(Method::Options.is_read_only());
        assert!(!Method::Post.is_read_only());
        assert!(!Method::Delete.is_read_only());
        assert!(!Method::Mcp.is_read_only());
    }

    #[test]
    fn embedding_text_shape() {
        let op = base_op();
        assert_eq!(
            op.text_for_embedding(),
            "Delete User: Deletes a user account (DELETE /users/{id})"
        );
    }
}

//! JSON-RPC Protocol Types
//!
//! Envelope types for the JSON-RPC 2.0 messages exchanged with the remote
//! design service, plus the typed payloads of the three tools the extractor
//! calls. Remote results are validated here, at the transport boundary, so
//! nothing downstream has to poke at raw `serde_json::Value`s.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TransportError;

/// Global counter for request ids
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate the next monotonic request id
pub fn next_request_id() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// JSON-RPC 2.0 Request structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    /// Build a request with a fresh id
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: next_request_id(),
        }
    }
}

/// JSON-RPC 2.0 Response structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

impl RpcResponse {
    /// Successful response carrying `result`
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id: json!(id),
            result: Some(result),
            error: None,
        }
    }

    /// Parse a stream frame or POST body as a response.
    ///
    /// Returns `None` when the JSON is not response-shaped (no `result` and
    /// no `error`), e.g. a server notification.
    pub fn from_frame(value: Value) -> Option<Self> {
        if value.get("result").is_none() && value.get("error").is_none() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Consume the response, turning a JSON-RPC error into `Err`
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self.result.unwrap_or(Value::Null))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 Error structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Method used to invoke a remote tool
pub const TOOLS_CALL: &str = "tools/call";

/// Method used by the connection probe
pub const TOOLS_LIST: &str = "tools/list";

/// The remote tools backing the three sub-extractions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTool {
    Variables,
    Components,
    Code,
}

impl RemoteTool {
    pub fn tool_name(&self) -> &'static str {
        match self {
            RemoteTool::Variables => "get_variable_defs",
            RemoteTool::Components => "get_code_connect_map",
            RemoteTool::Code => "get_code",
        }
    }

    /// Build `tools/call` params for a file and optional node
    pub fn call_params(&self, file_key: &str, node_id: Option<&str>) -> Value {
        let mut arguments = json!({ "fileKey": file_key });
        if let Some(node_id) = node_id {
            arguments["nodeId"] = json!(node_id);
        }
        json!({
            "name": self.tool_name(),
            "arguments": arguments,
        })
    }

    /// Validate a raw tool result into its typed payload
    pub fn parse(&self, result: &Value) -> Result<RemotePayload, TransportError> {
        match self {
            RemoteTool::Variables => parse_variables(result).map(RemotePayload::Variables),
            RemoteTool::Components => parse_components(result).map(RemotePayload::Components),
            RemoteTool::Code => parse_code(result).map(RemotePayload::Code),
        }
    }
}

impl fmt::Display for RemoteTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// One design token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignVariable {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "type")]
    pub kind: Option<String>,
}

/// One design-node to code-component mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeConnectMapping {
    pub node_id: String,
    pub component_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariablesResult {
    pub variables: Vec<DesignVariable>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentsResult {
    pub mappings: Vec<CodeConnectMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeResult {
    pub code: String,
}

/// Typed result of one remote tool call
#[derive(Debug, Clone, PartialEq)]
pub enum RemotePayload {
    Variables(VariablesResult),
    Components(ComponentsResult),
    Code(CodeResult),
}

/// Pull the text items out of an MCP tool result.
///
/// Tool results look like `{"content":[{"type":"text","text":"..."}]}`; an
/// `isError: true` result is reported as invalid.
fn tool_text(result: &Value) -> Result<Option<String>, TransportError> {
    let Some(content) = result.get("content").and_then(|c| c.as_array()) else {
        return Ok(None);
    };

    let text = content
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    if result.get("isError").and_then(|e| e.as_bool()) == Some(true) {
        return Err(TransportError::InvalidResponse(format!(
            "tool reported an error: {text}"
        )));
    }

    Ok(Some(text))
}

/// Resolve the structured body of a tool result: either the result itself or
/// the JSON embedded in its text content.
fn structured_body(result: &Value) -> Result<Value, TransportError> {
    match tool_text(result)? {
        Some(text) => serde_json::from_str(text.trim()).map_err(|e| {
            TransportError::InvalidResponse(format!("tool text is not JSON: {e}"))
        }),
        None => Ok(result.clone()),
    }
}

fn parse_variables(result: &Value) -> Result<VariablesResult, TransportError> {
    let body = structured_body(result)?;
    let body = body.get("variables").cloned().unwrap_or(body);

    let variables = match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<DesignVariable>)
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => map
            .into_iter()
            .map(|(name, value)| DesignVariable {
                name,
                value,
                kind: None,
            })
            .collect(),
        other => {
            return Err(TransportError::InvalidResponse(format!(
                "expected variable map or list, got {other}"
            )))
        }
    };

    Ok(VariablesResult { variables })
}

fn parse_components(result: &Value) -> Result<ComponentsResult, TransportError> {
    let body = structured_body(result)?;
    let body = body.get("mappings").cloned().unwrap_or(body);

    let mappings = match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<CodeConnectMapping>)
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(node_id, entry)| {
                let component_name = entry
                    .get("codeConnectName")
                    .or_else(|| entry.get("componentName"))
                    .and_then(|n| n.as_str())?
                    .to_string();
                let source = entry
                    .get("codeConnectSrc")
                    .or_else(|| entry.get("source"))
                    .and_then(|s| s.as_str())
                    .map(|s| s.to_string());
                Some(CodeConnectMapping {
                    node_id,
                    component_name,
                    source,
                })
            })
            .collect(),
        other => {
            return Err(TransportError::InvalidResponse(format!(
                "expected code connect map, got {other}"
            )))
        }
    };

    Ok(ComponentsResult { mappings })
}

fn parse_code(result: &Value) -> Result<CodeResult, TransportError> {
    let code = match tool_text(result)? {
        Some(text) => text,
        None => result
            .get("code")
            .and_then(|c| c.as_str())
            .or_else(|| result.as_str())
            .unwrap_or_default()
            .to_string(),
    };

    if code.trim().is_empty() {
        return Err(TransportError::InvalidResponse(
            "tool returned no code".to_string(),
        ));
    }

    Ok(CodeResult { code })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_result(text: &str) -> Value {
        json!({ "content": [{ "type": "text", "text": text }] })
    }

    #[test]
    fn test_request_ids_are_monotonic() {
        let a = RpcRequest::new("tools/list", json!({}));
        let b = RpcRequest::new("tools/list", json!({}));
        assert!(b.id > a.id);
        assert_eq!(a.jsonrpc, "2.0");
    }

    #[test]
    fn test_request_serde() {
        let req = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "tools/call".to_string(),
            params: json!({"name": "get_code"}),
            id: 7,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn test_response_from_frame() {
        let ok = RpcResponse::from_frame(json!({"jsonrpc": "2.0", "id": 3, "result": {}}));
        assert!(ok.is_some());

        let err = RpcResponse::from_frame(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        assert!(err.is_error());
        assert_eq!(err.into_result().unwrap_err().code, -32601);

        let notification =
            RpcResponse::from_frame(json!({"jsonrpc": "2.0", "method": "notifications/progress"}));
        assert!(notification.is_none());
    }

    #[test]
    fn test_call_params() {
        let params = RemoteTool::Variables.call_params("ABC123", Some("10-20"));
        assert_eq!(params["name"], "get_variable_defs");
        assert_eq!(params["arguments"]["fileKey"], "ABC123");
        assert_eq!(params["arguments"]["nodeId"], "10-20");

        let params = RemoteTool::Code.call_params("ABC123", None);
        assert!(params["arguments"].get("nodeId").is_none());
    }

    #[test]
    fn test_parse_variables_from_text_map() {
        let result = text_result(r##"{"Color/Primary":"#0D99FF","Spacing/MD":"16"}"##);
        let RemotePayload::Variables(vars) = RemoteTool::Variables.parse(&result).unwrap() else {
            panic!("wrong payload");
        };
        assert_eq!(vars.variables.len(), 2);
        assert_eq!(vars.variables[0].name, "Color/Primary");
        assert_eq!(vars.variables[0].value, json!("#0D99FF"));
    }

    #[test]
    fn test_parse_variables_structured_list() {
        let result = json!({
            "variables": [{"name": "radius", "value": 4, "type": "FLOAT"}]
        });
        let RemotePayload::Variables(vars) = RemoteTool::Variables.parse(&result).unwrap() else {
            panic!("wrong payload");
        };
        assert_eq!(vars.variables[0].kind.as_deref(), Some("FLOAT"));
    }

    #[test]
    fn test_parse_variables_rejects_garbage() {
        let err = RemoteTool::Variables
            .parse(&text_result("not json"))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_tool_error() {
        let result = json!({
            "content": [{"type": "text", "text": "node not found"}],
            "isError": true
        });
        let err = RemoteTool::Code.parse(&result).unwrap_err();
        assert!(err.to_string().contains("node not found"));
    }

    #[test]
    fn test_parse_code_connect_map() {
        let result = text_result(
            r#"{"1:2":{"codeConnectSrc":"src/Button.tsx","codeConnectName":"Button"},"3:4":{}}"#,
        );
        let RemotePayload::Components(components) =
            RemoteTool::Components.parse(&result).unwrap()
        else {
            panic!("wrong payload");
        };
        assert_eq!(components.mappings.len(), 1);
        assert_eq!(components.mappings[0].node_id, "1:2");
        assert_eq!(components.mappings[0].component_name, "Button");
        assert_eq!(
            components.mappings[0].source.as_deref(),
            Some("src/Button.tsx")
        );
    }

    #[test]
    fn test_parse_code() {
        let RemotePayload::Code(code) = RemoteTool::Code
            .parse(&text_result("export const Card = () => <div/>;"))
            .unwrap()
        else {
            panic!("wrong payload");
        };
        assert!(code.code.contains("Card"));

        assert!(RemoteTool::Code.parse(&text_result("   ")).is_err());
    }
}

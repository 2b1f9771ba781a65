//! Pure helper functions for the MCP handler, extracted for testability.
//!
//! These are stateless functions with no async or remote dependencies.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::rpc_codes;
use crate::protocol::{
    Content, Info, InitializeResult, JsonRpcResponse, RequestId, Resource, ResourceContents,
    ResourceTemplate, ResourcesCapability, ResourcesReadParams, ServerCapabilities, Tool,
    ToolAnnotations, ToolsCallResult, ToolsCapability,
};
use crate::registry::{Kind, Literal, OperationDescriptor, ParamType, Presence};
use crate::{Error, Result};

/// MIME type for structured results
const JSON_MIME: &str = "application/json";
/// MIME type for string results
const TEXT_MIME: &str = "text/plain";

// ============================================================================
// Request parsing
// ============================================================================

/// Extract a `RequestId` from a JSON value.
///
/// Supports string and integer ID values per JSON-RPC 2.0.
/// Returns `None` if the value is not a recognised ID type.
pub(crate) fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .map(RequestId::Number),
        _ => None,
    }
}

/// Check whether a method name represents a notification (no response expected).
pub(crate) fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse a JSON-RPC request or notification.
///
/// Returns `(id, method, params)`; `id` is `None` for notifications.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_request(
    value: &Value,
) -> std::result::Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    let jsonrpc = value.get("jsonrpc").and_then(Value::as_str);
    if jsonrpc != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method")
        })?;

    let params = value.get("params").cloned();

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Missing id",
        ));
    }

    Ok((id, method.to_string(), params))
}

/// Extract the client protocol version from initialize params.
///
/// Returns `"2024-11-05"` when params are `None` or missing `protocolVersion`.
pub(crate) fn extract_client_version(params: Option<&Value>) -> &str {
    params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or("2024-11-05")
}

/// Extract the `tools/call` name and arguments.
///
/// Arguments may be an object or a JSON string holding an object.
pub(crate) fn extract_tools_call_params(params: Option<&Value>) -> Result<(&str, Value)> {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol("Missing 'name' parameter".to_string()))?;

    let arguments = match params.and_then(|p| p.get("arguments")) {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            Error::invalid_argument("arguments", format!("invalid JSON string: {e}"))
        })?,
        Some(other) => other.clone(),
    };

    Ok((name, arguments))
}

/// Extract the `resources/read` URI
pub(crate) fn extract_resource_uri(params: Option<&Value>) -> Result<String> {
    let params = params.ok_or_else(|| Error::Protocol("Missing 'uri' parameter".to_string()))?;
    let ResourcesReadParams { uri } = ResourcesReadParams::deserialize(params)
        .map_err(|e| Error::Protocol(format!("Invalid resources/read params: {e}")))?;
    Ok(uri)
}

// ============================================================================
// Listings
// ============================================================================

/// Build the `InitializeResult` for a negotiated protocol version
pub(crate) fn build_initialize_result(negotiated_version: &str) -> InitializeResult {
    InitializeResult {
        protocol_version: negotiated_version.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
            resources: Some(ResourcesCapability {
                subscribe: false,
                list_changed: false,
            }),
            logging: None,
        },
        server_info: Info {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("LimeSurvey".to_string()),
        },
        instructions: Some(
            "Read surveys, questions, participants and responses through resources \
             (survey://, questions://{sid}, ...). Change them through tools. \
             Binary uploads are base64 text."
                .to_string(),
        ),
    }
}

fn param_schema(ty: ParamType, presence: Presence, description: &str) -> Value {
    let mut schema = match ty {
        ParamType::Integer => json!({"type": "integer"}),
        ParamType::String => json!({"type": "string"}),
        ParamType::Bool => json!({"type": "boolean"}),
        ParamType::Mapping => json!({"type": "object"}),
        ParamType::List => json!({"type": "array"}),
        ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
        ParamType::MappingList => json!({"type": "array", "items": {"type": "object"}}),
        ParamType::Binary => json!({"type": "string", "contentEncoding": "base64"}),
        ParamType::Date => json!({"type": "string", "format": "date"}),
        ParamType::Enum(allowed) => json!({"type": "string", "enum": allowed}),
        ParamType::Any => json!({}),
    };

    if let Value::Object(map) = &mut schema {
        if !description.is_empty() {
            map.insert("description".to_string(), json!(description));
        }
        if let Presence::Default(literal) = presence {
            if literal != Literal::Null {
                map.insert("default".to_string(), literal.to_value());
            }
        }
    }
    schema
}

/// JSON Schema for an operation's parameters
pub(crate) fn input_schema(descriptor: &OperationDescriptor) -> Value {
    let properties: Map<String, Value> = descriptor
        .params
        .iter()
        .map(|p| {
            (
                p.name.to_string(),
                param_schema(p.ty, p.presence, p.description),
            )
        })
        .collect();
    let required: Vec<&str> = descriptor
        .params
        .iter()
        .filter(|p| p.presence == Presence::Required)
        .map(|p| p.name)
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// MCP tool definition for a descriptor
pub(crate) fn build_tool(descriptor: &OperationDescriptor) -> Tool {
    Tool {
        name: descriptor.name.to_string(),
        title: None,
        description: Some(descriptor.description.to_string()),
        input_schema: input_schema(descriptor),
        annotations: Some(ToolAnnotations {
            read_only_hint: Some(descriptor.kind == Kind::Read),
            destructive_hint: Some(descriptor.destructive),
            open_world_hint: Some(false),
        }),
    }
}

/// MCP resource definition for a parameterless descriptor
pub(crate) fn build_resource(descriptor: &OperationDescriptor) -> Resource {
    Resource {
        uri: descriptor.name.to_string(),
        name: descriptor.description.to_string(),
        description: None,
        mime_type: Some(JSON_MIME.to_string()),
    }
}

/// MCP resource template for a parameterized descriptor
pub(crate) fn build_resource_template(descriptor: &OperationDescriptor) -> ResourceTemplate {
    ResourceTemplate {
        uri_template: descriptor.name.to_string(),
        name: descriptor.description.to_string(),
        description: None,
        mime_type: Some(JSON_MIME.to_string()),
    }
}

// ============================================================================
// Results
// ============================================================================

/// Render a result value as text: strings verbatim, everything else pretty JSON
pub(crate) fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Wrap a successful tool result into a `JsonRpcResponse`
pub(crate) fn wrap_tool_success(id: RequestId, content: &Value) -> JsonRpcResponse {
    let result = ToolsCallResult {
        content: vec![Content::Text {
            text: render_text(content),
        }],
        is_error: false,
    };
    to_success(id, &result)
}

/// Wrap a failed tool call into an `isError` result.
///
/// The text is a JSON object with the error kind, code and message, plus
/// the raw payload for remote faults.
pub(crate) fn wrap_tool_error(id: RequestId, error: &Error) -> JsonRpcResponse {
    let mut report = error.to_rpc_data();
    if let Value::Object(map) = &mut report {
        map.entry("code")
            .or_insert_with(|| json!(error.to_rpc_code().to_string()));
        map.entry("message")
            .or_insert_with(|| json!(error.to_string()));
    }
    let result = ToolsCallResult {
        content: vec![Content::Text {
            text: render_text(&report),
        }],
        is_error: true,
    };
    to_success(id, &result)
}

/// Answer a failed `tools/call`.
///
/// Argument, session and remote failures belong to the tool and come back as
/// `isError` results. Anything else is a JSON-RPC error.
pub(crate) fn tool_failure_response(id: RequestId, error: &Error) -> JsonRpcResponse {
    match error {
        Error::InvalidArgument { .. } | Error::SessionOpenFailed(_) | Error::Remote(_) => {
            wrap_tool_error(id, error)
        }
        _ => error_response(Some(id), error),
    }
}

/// Wrap a resource read result into `ResourceContents`
pub(crate) fn wrap_resource_contents(uri: &str, value: &Value) -> ResourceContents {
    let mime = if value.is_string() { TEXT_MIME } else { JSON_MIME };
    ResourceContents::Text {
        uri: uri.to_string(),
        mime_type: Some(mime.to_string()),
        text: render_text(value),
    }
}

/// Serialize a result into a success response
pub(crate) fn to_success<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            rpc_codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {e}"),
        ),
    }
}

/// Convert a gateway error into a JSON-RPC error response with kind data
pub(crate) fn error_response(id: Option<RequestId>, error: &Error) -> JsonRpcResponse {
    JsonRpcResponse::error_with_data(
        id,
        error.to_rpc_code(),
        error.to_string(),
        error.to_rpc_data(),
    )
}

// ============================================================================
// Tests
// ============================================================================

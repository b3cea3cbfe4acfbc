//! Request/response messages carried inside codec frames.
//!
//! Request:  `{"id", "method", "params"}`
//! Response: `{"id", "ok": true, "body"}` or
//!           `{"id", "ok": false, "error": {"code", "message"}}`

use crate::tools::ToolDescriptor;
use crate::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_CALL_TOOL: &str = "tools/call";

pub const PROTOCOL_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WireResponse {
    pub fn success(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, err: &Error) -> Self {
        Self {
            id: id.into(),
            ok: false,
            body: None,
            error: Some(WireError {
                code: err.to_ipc_error_code().to_string(),
                message: err.wire_message(),
            }),
        }
    }

    /// Turn a received response back into a result.
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            return Ok(self.body.unwrap_or(Value::Null));
        }
        match self.error {
            Some(WireError { code, message }) => Err(Error::from_ipc_error(&code, message)),
            None => Err(Error::protocol("error response without error details")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    pub server: String,
    pub version: String,
    pub tool_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub result: Value,
}

/// Encode a message as a JSON frame payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| {
        tracing::error!("JSON encoding failed: {}", e);
        Error::from(e)
    })
}

/// Decode a frame payload, mapping malformed input to a protocol error.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| Error::protocol(format!("Invalid JSON: {}", e)))
}

/// Deserialize method params, mapping shape errors to a validation error.
pub fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| Error::validation(format!("Invalid params for {}: {}", method, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_round_trip() {
        let response = WireResponse::failure("r1", &Error::unknown_tool("Unknown tool: x"));
        let bytes = encode(&response).unwrap();
        let back: WireResponse = decode(&bytes).unwrap();
        assert!(!back.ok);
        assert!(matches!(back.into_result(), Err(Error::UnknownTool(_))));
    }

    #[test]
    fn test_error_without_details_is_protocol_error() {
        let response: WireResponse =
            serde_json::from_value(serde_json::json!({"id": "r", "ok": false})).unwrap();
        assert!(matches!(response.into_result(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_params_null_is_empty() {
        let params: InitializeParams = parse_params(METHOD_INITIALIZE, Value::Null).unwrap();
        assert_eq!(params, InitializeParams::default());

        let err = parse_params::<CallToolParams>(METHOD_CALL_TOOL, serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_decode_garbage_is_protocol_error() {
        assert!(matches!(decode::<WireRequest>(b"\x00\x01"), Err(Error::Protocol(_))));
    }
}

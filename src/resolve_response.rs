use crate::{resolve_request::JSON_RPC_VERSION, Error};

/// A JSON-RPC resolve response envelope: exactly one of result and error.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ResolveResponse {
    pub id: Option<String>,
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl ResolveResponse {
    pub fn success(id: String, result: serde_json::Value) -> Self {
        Self {
            id: Some(id),
            jsonrpc: JSON_RPC_VERSION.to_string(),
            result: Some(result),
            error: None,
        }
    }
    pub fn failure(id: String, code: i64, message: String) -> Self {
        Self {
            id: Some(id),
            jsonrpc: JSON_RPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .expect("programmer error: resolve response is always serializable")
    }

    /// Parse a response off the wire and extract its result payload.  A
    /// server-reported error surfaces as [Error::ServerError]; it is never
    /// mistaken for a confirmed NOT_FOUND.
    pub fn extract_result(bytes: &[u8]) -> Result<serde_json::Value, Error> {
        let response: ResolveResponse = serde_json::from_slice(bytes)
            .map_err(|_| Error::MalformedResolveResponse("invalid response JSON".into()))?;
        if response.jsonrpc != JSON_RPC_VERSION {
            return Err(Error::MalformedResolveResponse(
                "invalid JSON-RPC version".into(),
            ));
        }
        match (response.result, response.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(Error::ServerError {
                code: error.code,
                message: error.message,
            }),
            (None, None) => Err(Error::MalformedResolveResponse(
                "missing result or error".into(),
            )),
        }
    }
}

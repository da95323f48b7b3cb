//! Worker wire protocol: configuration, requests and responses.
//!
//! One raw string per message, both directions:
//!
//! ```text
//! UI -> worker  {"network":"mainnet","ethereum_url":"...","starknet_url":"..."}
//! worker -> UI  OK                                    (unframed ready signal)
//! UI -> worker  {"id":1,"state":{}}
//! UI -> worker  {"id":2,"execute":{...}}
//! worker -> UI  {"id":1,"result":...} | {"id":2,"error":"..."}
//! ```
//!
//! Request ids are caller-assigned. The protocol does not enforce uniqueness;
//! a caller that reuses an id before its response arrives gets ambiguous
//! correlation and that is its own problem. Correlation is by id, never by
//! arrival order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{sanitize, Error};

/// Unframed signal emitted once when configuration succeeds.
pub const READY_SIGNAL: &str = "OK";

/// The configuration message, consumed once to construct the compute engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigMessage {
    /// Network name, e.g. `mainnet` or `sepolia`.
    pub network: String,
    /// Ethereum JSON-RPC endpoint (usually routed through the proxy).
    pub ethereum_url: String,
    /// Starknet JSON-RPC endpoint (usually routed through the proxy).
    pub starknet_url: String,
}

impl ConfigMessage {
    /// Parse a raw configuration message.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("invalid config: {e}")))
    }
}

/// Engine method selected by the request discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `{"id":n,"state":{}}` - query engine state.
    State,
    /// `{"id":n,"execute":{...}}` - run an engine call with the payload.
    Execute,
    /// Any other discriminator. Reported back under the request id.
    Unknown,
}

/// A tagged inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Caller-assigned correlation id.
    pub id: u64,
    /// Selected engine method.
    pub method: Method,
    /// Engine-specific call payload (`execute` only).
    pub payload: Value,
}

impl Request {
    /// Parse a raw request message.
    ///
    /// A message without a usable integer `id` cannot be correlated at all
    /// and surfaces as a transport-level error (the only framed-response
    /// exception besides the ready signal).
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::Transport(format!("invalid request: {e}")))?;
        let id = value
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Transport("request is missing an integer id".to_string()))?;

        if value.get("state").is_some() {
            return Ok(Self { id, method: Method::State, payload: Value::Null });
        }
        if let Some(payload) = value.get("execute") {
            return Ok(Self { id, method: Method::Execute, payload: payload.clone() });
        }
        Ok(Self { id, method: Method::Unknown, payload: Value::Null })
    }
}

/// A tagged outbound response carrying exactly one of `result` / `error`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Response {
    /// Correlation id echoed from the originating request.
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    /// A success response wrapping the engine result verbatim.
    #[must_use]
    pub fn result(id: u64, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    /// An error response. The message is sanitized to a single line with
    /// normalized quotes before framing.
    #[must_use]
    pub fn error(id: u64, message: &str) -> Self {
        Self { id, result: None, error: Some(sanitize(message)) }
    }

    /// Whether this is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to the single-string wire form.
    #[must_use]
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).expect("response serialization cannot fail")
    }
}

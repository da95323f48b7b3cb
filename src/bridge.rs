//! Synchronous network bridge for the worker session.
//!
//! The compute engine's multi-step protocols depend on strict request and
//! response ordering, so its outbound HTTP calls are plain blocking calls on
//! the worker thread. The whole session stalls for the duration of each round
//! trip; that is the intended trade-off, not an accident. No other message is
//! processed while a call is in flight.
//!
//! The bridge performs no retries. Retry policy, if any, belongs to the
//! engine.

// Rust guideline compliant 2026-02

use std::time::{Duration, Instant};

use crate::error::Error;

/// Placeholder logged when the request body is not a JSON-RPC call.
const OPAQUE_METHOD: &str = "<opaque>";

/// Blocking HTTP call primitive with an explicit per-call timeout.
#[derive(Debug)]
pub struct Bridge {
    client: reqwest::blocking::Client,
}

impl Bridge {
    /// Create a bridge whose calls time out after `timeout`.
    ///
    /// Must be called from a thread that is not driving an async runtime;
    /// the worker session thread qualifies.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Perform one blocking HTTP round trip and return the response body.
    ///
    /// Non-2xx statuses surface as [`Error::Http`] carrying the status text;
    /// transport failures (DNS, refused connection, timeout) surface as
    /// [`Error::Transport`] with the underlying message.
    pub fn call(
        &self,
        url: &str,
        method: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<String, Error> {
        let rpc_method = body.map_or(OPAQUE_METHOD.to_string(), parse_rpc_method);
        let started = Instant::now();

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| Error::Transport(format!("invalid HTTP method: {e}")))?;
        let mut request = self.client.request(method, url);
        for &(name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let result = request
            .send()
            .map_err(|e| Error::Transport(e.to_string()))
            .and_then(|response| {
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::Http {
                        status: status.as_u16(),
                        text: status.canonical_reason().unwrap_or("").to_string(),
                    });
                }
                response.text().map_err(|e| Error::Transport(e.to_string()))
            });

        // Observability only; never feeds back into control flow.
        log::debug!(
            "[Bridge] {} -> {} ({} ms, {})",
            rpc_method,
            url,
            started.elapsed().as_millis(),
            match &result {
                Ok(body) => format!("{} bytes", body.len()),
                Err(e) => e.to_string(),
            }
        );

        result
    }
}

/// Best-effort extraction of the JSON-RPC method name from a request body.
fn parse_rpc_method(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("method").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| OPAQUE_METHOD.to_string())
}

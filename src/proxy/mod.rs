//! CORS-rewriting forwarding proxy.
//!
//! An independent network-facing process: accepts any HTTP request from the
//! browser context, reconstructs the real upstream URL from the request path
//! (see [`rewrite`]), forwards the request, and relays the upstream response
//! with permissive CORS headers so the browser's same-origin policy does not
//! block the worker's outbound calls.
//!
//! ```text
//! Browser/Worker ──> Proxy ── rewrite ──> https://upstream/...
//!                      │
//!                      └── CORS headers on every response, preflight included
//! ```
//!
//! Each forwarded request is independent and stateless; the only shared state
//! is the read-only scheme override table. No retries, no caching. A failure
//! to reach the upstream still completes the inbound exchange (502), it never
//! leaves the connection hanging.

// Rust guideline compliant 2026-02

pub mod rewrite;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::config::Config;
use crate::error::{sanitize, Error};
use self::rewrite::{rewrite_target, SchemeOverride};

/// Shared, read-only proxy state.
#[derive(Debug)]
pub struct ProxyState {
    client: reqwest::Client,
    overrides: Vec<SchemeOverride>,
    body_limit: usize,
}

impl ProxyState {
    /// Build the forwarding client and capture the rewrite table.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.proxy_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to create forwarding client")?;
        Ok(Self {
            client,
            overrides: config.scheme_overrides.clone(),
            body_limit: config.proxy_body_limit,
        })
    }

    /// One outbound round trip: forward method and body verbatim, return
    /// (status, upstream content type, body).
    ///
    /// Incoming headers are intentionally dropped; the upstream sees a bare
    /// request. A `Content-Type: application/json` is set when a body is
    /// present, which is what the original forwarder's JSON re-encoding
    /// amounted to and what JSON-RPC upstreams require.
    async fn forward(
        &self,
        method: Method,
        target: &str,
        body: Bytes,
    ) -> Result<(StatusCode, Option<HeaderValue>, Bytes), Error> {
        let mut request = self.client.request(method, target);
        if !body.is_empty() {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok((status, content_type, body))
    }
}

/// CORS headers attached to every response, preflight included.
fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    // The worker sends GET and POST through the proxy; advertise what is
    // actually forwarded.
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers
}

/// The single catch-all handler. There is no route table: every path is a
/// rewrite target.
async fn handle(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let method = request.method().clone();

    if method == Method::OPTIONS {
        // Preflight: answer immediately, no upstream call.
        return (StatusCode::NO_CONTENT, cors_headers()).into_response();
    }
    if request.uri().path() == "/favicon.ico" {
        return (StatusCode::NO_CONTENT, cors_headers()).into_response();
    }

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = match to_bytes(request.into_body(), state.body_limit).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                cors_headers(),
                "request body too large\n",
            )
                .into_response();
        }
    };

    let target = rewrite_target(&path_and_query, &state.overrides);
    log::info!(">>> {method} {target}");

    match state.forward(method, &target, body).await {
        Ok((status, content_type, bytes)) => {
            log::info!("<<< {target}: {}", status.as_u16());
            let mut headers = cors_headers();
            if let Some(content_type) = content_type {
                headers.insert(header::CONTENT_TYPE, content_type);
            }
            (status, headers, bytes).into_response()
        }
        Err(error) => {
            log::warn!("<<< {target}: {error}");
            (
                StatusCode::BAD_GATEWAY,
                cors_headers(),
                format!("upstream unreachable: {}\n", sanitize(&error.to_string())),
            )
                .into_response()
        }
    }
}

/// Build the proxy router around shared state.
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn run(config: &Config) -> Result<()> {
    let state = Arc::new(ProxyState::new(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.proxy_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.proxy_port))?;
    log::info!("proxy listening on port {}", config.proxy_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("proxy server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("proxy shutting down");
}

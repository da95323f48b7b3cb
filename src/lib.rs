//! Lightbridge - messaging and forwarding layer for a browser-hosted
//! light client.
//!
//! A browser UI drives a long-lived, stateful compute engine that cannot
//! reach the public network directly because of browser-origin restrictions.
//! This crate provides the two pieces that make that work:
//!
//! - **Worker session** - a request/response correlation protocol with an
//!   explicit lifecycle state machine gating a single background worker,
//!   plus a synchronous bridge for the engine's outbound network calls.
//! - **Forwarding proxy** - an independent CORS-rewriting process that
//!   reconstructs upstream URLs from request paths and forwards
//!   transparently.
//!
//! # Architecture
//!
//! ```text
//! UI ──messages──> Session (state machine + correlator)
//!                     └── ComputeEngine ──> Bridge ──> Proxy ──> upstream
//! ```
//!
//! # Modules
//!
//! - [`session`] - worker actor, lifecycle state machine, wire protocol
//! - [`engine`] - compute engine seam and the JSON-RPC facade engine
//! - [`bridge`] - blocking HTTP call primitive for the worker thread
//! - [`proxy`] - CORS-rewriting forwarder
//! - [`config`] - configuration loading/saving

// Library modules
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod proxy;
pub mod session;

// Re-export commonly used types
pub use bridge::Bridge;
pub use config::Config;
pub use engine::{ComputeEngine, EngineFactory, RpcEngine, RpcEngineFactory};
pub use error::Error;
pub use session::{spawn, Session, SessionHandle};

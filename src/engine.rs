//! Compute engine seam.
//!
//! The engine is an opaque capability from the session's point of view: it is
//! constructed once from a [`ConfigMessage`] and then answers `get_state` and
//! `execute` calls. Both traits are synchronous because the worker session is
//! a single blocking thread and the [`Bridge`](crate::bridge::Bridge) is its
//! only I/O primitive.
//!
//! [`RpcEngine`] is the built-in implementation: a JSON-RPC facade over the
//! configured endpoints. Its constructor issues network calls through the
//! bridge to validate that both endpoints answer for the configured network,
//! which is the "engine finishes its own initialization over the network"
//! step of the session lifecycle.

use std::time::Duration;

use serde_json::{json, Value};

use crate::bridge::Bridge;
use crate::error::Error;
use crate::session::protocol::ConfigMessage;

const MAINNET_ETHEREUM_CHAINID: &str = "0x1";
const SEPOLIA_ETHEREUM_CHAINID: &str = "0xaa36a7";

const MAINNET_STARKNET_CHAINID: &str = "0x534e5f4d41494e";
const SEPOLIA_STARKNET_CHAINID: &str = "0x534e5f5345504f4c4941";

/// A configured, long-lived compute engine owned by one worker session.
pub trait ComputeEngine: Send {
    /// Query the engine's current state.
    fn get_state(&mut self) -> Result<Value, Error>;

    /// Run an engine-specific call with the given payload.
    fn execute(&mut self, call: Value) -> Result<Value, Error>;
}

/// Constructs engines from configuration messages.
///
/// The session actor is generic over the factory so tests can inject mock
/// engines without any network.
pub trait EngineFactory: Send + 'static {
    /// Attempt to construct an engine. A failure here is recoverable: the
    /// session reports it and stays reconfigurable.
    fn configure(&self, config: &ConfigMessage) -> Result<Box<dyn ComputeEngine>, Error>;
}

/// Networks the RPC engine knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "mainnet" => Ok(Self::Mainnet),
            "sepolia" => Ok(Self::Sepolia),
            other => Err(Error::Configuration(format!("unrecognized network: {other}"))),
        }
    }

    /// Expected (ethereum, starknet) chain id pair.
    fn chain_ids(self) -> (&'static str, &'static str) {
        match self {
            Self::Mainnet => (MAINNET_ETHEREUM_CHAINID, MAINNET_STARKNET_CHAINID),
            Self::Sepolia => (SEPOLIA_ETHEREUM_CHAINID, SEPOLIA_STARKNET_CHAINID),
        }
    }
}

/// Factory for [`RpcEngine`].
#[derive(Debug, Clone)]
pub struct RpcEngineFactory {
    bridge_timeout: Duration,
}

impl RpcEngineFactory {
    /// Create a factory whose engines use the given per-call bridge timeout.
    #[must_use]
    pub fn new(bridge_timeout: Duration) -> Self {
        Self { bridge_timeout }
    }
}

impl EngineFactory for RpcEngineFactory {
    fn configure(&self, config: &ConfigMessage) -> Result<Box<dyn ComputeEngine>, Error> {
        let engine = RpcEngine::new(config, self.bridge_timeout)?;
        Ok(Box::new(engine))
    }
}

/// JSON-RPC facade over the configured Starknet endpoint.
pub struct RpcEngine {
    bridge: Bridge,
    starknet_url: String,
}

impl std::fmt::Debug for RpcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEngine")
            .field("starknet_url", &self.starknet_url)
            .finish_non_exhaustive()
    }
}

impl RpcEngine {
    /// Construct the engine, validating both endpoints over the bridge.
    ///
    /// Both chain ids must match the configured network; a mismatch (or an
    /// unreachable endpoint) is a configuration failure and the session stays
    /// reconfigurable.
    pub fn new(config: &ConfigMessage, bridge_timeout: Duration) -> Result<Self, Error> {
        let network = Network::parse(&config.network)?;
        let bridge = Bridge::new(bridge_timeout)?;

        let ethereum_chain = rpc_call(&bridge, &config.ethereum_url, "eth_chainId", json!([]))
            .map_err(|e| Error::Configuration(format!("ethereum endpoint check failed: {e}")))?;
        let starknet_chain =
            rpc_call(&bridge, &config.starknet_url, "starknet_chainId", json!([]))
                .map_err(|e| {
                    Error::Configuration(format!("starknet endpoint check failed: {e}"))
                })?;

        let (expected_ethereum, expected_starknet) = network.chain_ids();
        let ethereum_chain = ethereum_chain.as_str().unwrap_or_default().to_string();
        let starknet_chain = starknet_chain.as_str().unwrap_or_default().to_string();
        if ethereum_chain != expected_ethereum || starknet_chain != expected_starknet {
            return Err(Error::Configuration(format!(
                "chain id mismatch ethereum={ethereum_chain} starknet={starknet_chain}"
            )));
        }

        log::info!("engine ready (network={}, starknet={})", config.network, config.starknet_url);
        Ok(Self { bridge, starknet_url: config.starknet_url.clone() })
    }

    fn rpc(&self, method: &str, params: Value) -> Result<Value, Error> {
        rpc_call(&self.bridge, &self.starknet_url, method, params)
    }
}

impl ComputeEngine for RpcEngine {
    /// `{block_number, block_hash, root}` for the latest block.
    fn get_state(&mut self) -> Result<Value, Error> {
        let head = self.rpc("starknet_blockHashAndNumber", json!([]))?;
        let block_hash = head
            .get("block_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Engine("block hash missing".to_string()))?
            .to_string();
        let block_number = head
            .get("block_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Engine("block number missing".to_string()))?;

        let update = self.rpc(
            "starknet_getStateUpdate",
            json!([{ "block_hash": block_hash }]),
        )?;
        let root = update
            .get("new_root")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(json!({
            "block_number": block_number,
            "block_hash": block_hash,
            "root": root,
        }))
    }

    /// Run a function call against the latest block.
    fn execute(&mut self, call: Value) -> Result<Value, Error> {
        self.rpc("starknet_call", json!([call, "latest"]))
    }
}

/// One JSON-RPC round trip over the bridge.
fn rpc_call(bridge: &Bridge, url: &str, method: &str, params: Value) -> Result<Value, Error> {
    let request = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 0,
    })
    .to_string();

    let body = bridge.call(
        url,
        "POST",
        &[("Content-Type", "application/json")],
        Some(&request),
    )?;
    let response: Value = serde_json::from_str(&body)
        .map_err(|e| Error::Engine(format!("invalid response for '{method}': {e}")))?;

    if let Some(error) = response.get("error") {
        let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        return Err(Error::Engine(format!("'{method}' failed: {message}")));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| Error::Engine(format!("result missing for '{method}'")))
}

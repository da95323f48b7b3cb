//! Worker session: a single sequential unit of execution driving one
//! compute engine.
//!
//! # Architecture
//!
//! ```text
//! UI transport ──inbound queue──> [ worker thread ]──outbound queue──> UI
//!                                   Session
//!                                     ├── ConnectionState (lifecycle)
//!                                     ├── Correlator (id <-> response)
//!                                     └── ComputeEngine ──> Bridge ──> Proxy
//! ```
//!
//! The implicit event callback of the original design is reified as an
//! explicit actor: a dedicated OS thread owns the [`ConnectionState`] and the
//! engine, consumes exactly one inbound message at a time, and emits zero or
//! one outbound message per inbound. The bridge's blocking calls stall the
//! whole thread; nothing else is processed meanwhile, which is what the
//! engine's multi-step protocols require. There is no shared-memory race to
//! guard against because there is no parallelism within a session.
//!
//! The first inbound message is always treated as configuration. On success
//! the session emits the unframed ready literal and dispatches tagged
//! requests forever after; on failure it reports and stays reconfigurable.

pub mod correlator;
pub mod protocol;
pub mod state;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::engine::EngineFactory;
use crate::error::{sanitize, Error};
use self::correlator::Correlator;
use self::protocol::{ConfigMessage, Request, Response, READY_SIGNAL};
use self::state::ConnectionState;

/// One worker session: lifecycle gate, correlator and engine handle.
pub struct Session<F: EngineFactory> {
    state: ConnectionState,
    factory: F,
    correlator: Option<Correlator>,
    last_error: Option<String>,
}

impl<F: EngineFactory> std::fmt::Debug for Session<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl<F: EngineFactory> Session<F> {
    /// Create an unconfigured session.
    pub fn new(factory: F) -> Self {
        Self {
            state: ConnectionState::default(),
            factory,
            correlator: None,
            last_error: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The most recent configuration failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Process one raw inbound message and produce zero or one outbound
    /// message.
    ///
    /// Before Ready, the message is treated as configuration; after, as a
    /// tagged request.
    pub fn handle_inbound(&mut self, raw: &str) -> Option<String> {
        if self.state.is_ready() {
            Some(self.handle_request(raw))
        } else {
            Some(self.handle_configuration(raw))
        }
    }

    /// Submit a parsed request. Requires Ready; submitting earlier is a
    /// protocol error, not a silent drop.
    pub fn submit(&mut self, request: Request) -> Result<Response, Error> {
        match self.correlator.as_mut() {
            Some(correlator) => Ok(correlator.submit(request)),
            None => Err(Error::NotReady),
        }
    }

    fn handle_configuration(&mut self, raw: &str) -> String {
        let config = match ConfigMessage::parse(raw) {
            Ok(config) => config,
            Err(error) => {
                // Unframed: there is no id to echo before configuration.
                self.last_error = Some(error.to_string());
                return sanitize(&error.to_string());
            }
        };

        self.state.begin_configuration();
        match self.factory.configure(&config) {
            Ok(engine) => {
                self.correlator = Some(Correlator::new(engine));
                self.state.complete_configuration();
                self.last_error = None;
                log::info!("session ready (network={})", config.network);
                READY_SIGNAL.to_string()
            }
            Err(error) => {
                self.state.fail_configuration();
                let message = error.to_string();
                log::warn!("configuration failed: {message}");
                self.last_error = Some(message.clone());
                sanitize(&message)
            }
        }
    }

    fn handle_request(&mut self, raw: &str) -> String {
        let request = match Request::parse(raw) {
            Ok(request) => request,
            // No id to echo: surfaces unframed, like other transport errors.
            Err(error) => return sanitize(&error.to_string()),
        };
        match self.submit(request) {
            Ok(response) => response.to_wire(),
            Err(error) => sanitize(&error.to_string()),
        }
    }
}

/// Handle to a spawned worker session.
///
/// The transport side sends raw inbound strings and drains raw outbound
/// strings; the session thread exits when the handle (inbound sender) is
/// dropped.
#[derive(Debug)]
pub struct SessionHandle {
    inbound: mpsc::UnboundedSender<String>,
    outbound: mpsc::UnboundedReceiver<String>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue one raw inbound message.
    pub fn send(&self, raw: String) -> Result<()> {
        self.inbound.send(raw).context("worker session is gone")
    }

    /// Await the next outbound message (async transports).
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Block for the next outbound message (sync transports). Must not be
    /// called from an async runtime thread.
    pub fn blocking_recv(&mut self) -> Option<String> {
        self.outbound.blocking_recv()
    }

    /// Drop the inbound queue and join the worker thread.
    pub fn shutdown(mut self) {
        drop(self.inbound);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn a worker session on its own OS thread.
pub fn spawn<F: EngineFactory>(factory: F) -> Result<SessionHandle> {
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();

    let thread = std::thread::Builder::new()
        .name("worker-session".to_string())
        .spawn(move || {
            let mut session = Session::new(factory);
            while let Some(raw) = inbound_rx.blocking_recv() {
                if let Some(outbound) = session.handle_inbound(&raw) {
                    if outbound_tx.send(outbound).is_err() {
                        // Transport went away; nothing left to answer to.
                        break;
                    }
                }
            }
            log::debug!("worker session thread exiting");
        })
        .context("failed to spawn worker session thread")?;

    Ok(SessionHandle {
        inbound: inbound_tx,
        outbound: outbound_rx,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ComputeEngine;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Factory double: fails the first `failures` configure calls, then
    /// hands out a fixed-state engine.
    struct FlakyFactory {
        failures: AtomicUsize,
        attempts: Arc<AtomicUsize>,
    }

    impl FlakyFactory {
        fn reliable() -> Self {
            Self::failing(0)
        }

        fn failing(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                attempts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FixedEngine;

    impl ComputeEngine for FixedEngine {
        fn get_state(&mut self) -> Result<Value, Error> {
            Ok(json!({"block_number": 99, "block_hash": "0xbeef", "root": "0xcafe"}))
        }

        fn execute(&mut self, call: Value) -> Result<Value, Error> {
            if call.get("boom").is_some() {
                Err(Error::Engine("call \"exploded\"\nbacktrace".to_string()))
            } else {
                Ok(json!(["0x1"]))
            }
        }
    }

    impl EngineFactory for FlakyFactory {
        fn configure(&self, _config: &ConfigMessage) -> Result<Box<dyn ComputeEngine>, Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                Err(Error::Configuration("endpoint unreachable".to_string()))
            } else {
                Ok(Box::new(FixedEngine))
            }
        }
    }

    const CONFIG: &str = r#"{"network":"mainnet","ethereum_url":"http://proxy/eth","starknet_url":"http://proxy/starknet"}"#;

    #[test]
    fn configuration_reaches_ready_and_emits_ok() {
        let mut session = Session::new(FlakyFactory::reliable());
        assert_eq!(session.handle_inbound(CONFIG).unwrap(), "OK");
        assert!(session.state().is_ready());
    }

    #[test]
    fn state_request_round_trip() {
        let mut session = Session::new(FlakyFactory::reliable());
        session.handle_inbound(CONFIG);

        let out = session.handle_inbound(r#"{"id":1,"state":{}}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["block_number"], 99);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn submit_before_ready_is_not_ready_error() {
        let mut session = Session::new(FlakyFactory::reliable());
        let request = Request::parse(r#"{"id":1,"state":{}}"#).unwrap();
        assert!(matches!(session.submit(request), Err(Error::NotReady)));
    }

    #[test]
    fn request_before_configuration_is_treated_as_config() {
        let mut session = Session::new(FlakyFactory::reliable());
        // Not a config message; reported unframed, session reconfigurable.
        let out = session.handle_inbound(r#"{"id":1,"state":{}}"#).unwrap();
        assert!(out.starts_with("configuration failed"));
        assert!(!session.state().is_ready());

        assert_eq!(session.handle_inbound(CONFIG).unwrap(), "OK");
    }

    #[test]
    fn failed_configuration_reports_and_allows_retry() {
        let factory = FlakyFactory::failing(1);
        let attempts = Arc::clone(&factory.attempts);
        let mut session = Session::new(factory);

        let first = session.handle_inbound(CONFIG).unwrap();
        assert!(first.contains("endpoint unreachable"));
        assert!(!session.state().is_ready());
        assert_eq!(session.last_error(), Some("configuration failed: endpoint unreachable"));

        let second = session.handle_inbound(CONFIG).unwrap();
        assert_eq!(second, "OK");
        assert!(session.state().is_ready());
        assert_eq!(session.last_error(), None);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn engine_failure_keeps_session_ready() {
        let mut session = Session::new(FlakyFactory::reliable());
        session.handle_inbound(CONFIG);

        let out = session.handle_inbound(r#"{"id":5,"execute":{"boom":true}}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 5);
        assert_eq!(value["error"], "call 'exploded'");
        assert!(session.state().is_ready());

        // Next request still served.
        let out = session.handle_inbound(r#"{"id":6,"state":{}}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 6);
        assert!(value.get("result").is_some());
    }

    #[test]
    fn unknown_discriminator_response() {
        let mut session = Session::new(FlakyFactory::reliable());
        session.handle_inbound(CONFIG);

        let out = session.handle_inbound(r#"{"id":9,"frobnicate":{}}"#).unwrap();
        assert_eq!(out, r#"{"id":9,"error":"unknown request"}"#);
    }

    #[test]
    fn response_ids_echo_request_ids() {
        let mut session = Session::new(FlakyFactory::reliable());
        session.handle_inbound(CONFIG);

        // Ids are caller-assigned; arbitrary values and gaps are fine.
        for id in [1u64, 17, 3, 1000] {
            let out = session
                .handle_inbound(&format!(r#"{{"id":{id},"state":{{}}}}"#))
                .unwrap();
            let value: Value = serde_json::from_str(&out).unwrap();
            assert_eq!(value["id"], id);
        }
    }

    #[test]
    fn unparsable_request_after_ready_is_unframed() {
        let mut session = Session::new(FlakyFactory::reliable());
        session.handle_inbound(CONFIG);

        let out = session.handle_inbound("not json at all").unwrap();
        // Plain string, not a framed response.
        assert!(serde_json::from_str::<Value>(&out).is_err());
        assert!(session.state().is_ready());
    }

    #[tokio::test]
    async fn spawned_session_round_trip() {
        let mut handle = spawn(FlakyFactory::reliable()).unwrap();

        handle.send(CONFIG.to_string()).unwrap();
        assert_eq!(handle.recv().await.unwrap(), "OK");

        handle.send(r#"{"id":1,"state":{}}"#.to_string()).unwrap();
        let out = handle.recv().await.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["block_hash"], "0xbeef");

        handle.shutdown();
    }

    #[tokio::test]
    async fn spawned_session_processes_in_submission_order() {
        let mut handle = spawn(FlakyFactory::reliable()).unwrap();
        handle.send(CONFIG.to_string()).unwrap();
        assert_eq!(handle.recv().await.unwrap(), "OK");

        // The worker is single-threaded, so responses come back in
        // submission order; callers must still correlate by id.
        for id in 1..=5u64 {
            handle.send(format!(r#"{{"id":{id},"state":{{}}}}"#)).unwrap();
        }
        for id in 1..=5u64 {
            let value: Value =
                serde_json::from_str(&handle.recv().await.unwrap()).unwrap();
            assert_eq!(value["id"], id);
        }

        handle.shutdown();
    }
}

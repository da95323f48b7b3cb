//! Request correlation: pairing every response with the request that
//! caused it.
//!
//! The correlator only exists once configuration has succeeded, so the
//! "submit requires Ready" contract is carried by the type: a session that is
//! not Ready has no correlator to submit through.

use crate::engine::ComputeEngine;
use crate::error::Error;
use crate::session::protocol::{Method, Request, Response};

/// Dispatches tagged requests to the engine and tags the outcome with the
/// originating id.
pub struct Correlator {
    engine: Box<dyn ComputeEngine>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator").finish_non_exhaustive()
    }
}

impl Correlator {
    /// Wrap a freshly constructed engine.
    #[must_use]
    pub fn new(engine: Box<dyn ComputeEngine>) -> Self {
        Self { engine }
    }

    /// Dispatch one request and produce its tagged response.
    ///
    /// Every outcome, including an unknown discriminator and an engine
    /// failure, maps to a response carrying the original id; nothing here
    /// aborts the session.
    pub fn submit(&mut self, request: Request) -> Response {
        let outcome = match request.method {
            Method::State => self.engine.get_state(),
            Method::Execute => self.engine.execute(request.payload),
            Method::Unknown => Err(Error::UnknownMethod),
        };
        match outcome {
            Ok(result) => Response::result(request.id, result),
            Err(error) => Response::error(request.id, &error.to_string()),
        }
    }
}

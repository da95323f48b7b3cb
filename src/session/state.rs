//! Session lifecycle state machine.
//!
//! Gates all request processing behind a single configuration step:
//!
//! ```text
//! Uninitialized ──configure──> Initializing ──ok──> Ready
//!       ^                           │
//!       └──────────failed───────────┘
//! ```
//!
//! A construction failure is reported and the machine returns to
//! `Uninitialized`; there is no terminal failure state. `Ready` is absorbing:
//! the session never regresses to an earlier state.

/// Readiness of a worker session. One instance per session, mutated only by
/// the session's own message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No configuration received yet (or the last one failed).
    #[default]
    Uninitialized,
    /// Engine construction in progress.
    Initializing,
    /// Engine constructed; requests are accepted indefinitely.
    Ready,
}

impl ConnectionState {
    /// Enter `Initializing`. Idempotent from `Uninitialized` or a failed
    /// retry; a no-op guard against regressing from `Ready`.
    pub fn begin_configuration(&mut self) {
        if *self != Self::Ready {
            *self = Self::Initializing;
        }
    }

    /// Engine construction succeeded.
    pub fn complete_configuration(&mut self) {
        *self = Self::Ready;
    }

    /// Engine construction failed; the session stays reconfigurable.
    pub fn fail_configuration(&mut self) {
        if *self != Self::Ready {
            *self = Self::Uninitialized;
        }
    }

    /// Whether requests may be dispatched.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        assert_eq!(ConnectionState::default(), ConnectionState::Uninitialized);
        assert!(!ConnectionState::default().is_ready());
    }

    #[test]
    fn successful_configuration_reaches_ready() {
        let mut state = ConnectionState::default();
        state.begin_configuration();
        assert_eq!(state, ConnectionState::Initializing);
        state.complete_configuration();
        assert!(state.is_ready());
    }

    #[test]
    fn failed_configuration_allows_retry() {
        let mut state = ConnectionState::default();
        state.begin_configuration();
        state.fail_configuration();
        assert_eq!(state, ConnectionState::Uninitialized);

        // Retry succeeds.
        state.begin_configuration();
        state.complete_configuration();
        assert!(state.is_ready());
    }

    #[test]
    fn ready_never_regresses() {
        let mut state = ConnectionState::Ready;
        state.begin_configuration();
        assert!(state.is_ready());
        state.fail_configuration();
        assert!(state.is_ready());
    }
}

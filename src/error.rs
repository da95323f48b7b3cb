//! Error taxonomy for the worker session, bridge and proxy.
//!
//! Every error that can cross the worker protocol boundary is sanitized to a
//! single line with normalized quotes, so it embeds in a JSON string without
//! further escaping. No variant is fatal to an established session or to the
//! proxy process; a configuration failure leaves the session reconfigurable.

use thiserror::Error;

/// Errors produced by the session, correlator, bridge and proxy layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine construction failed. Recoverable: the session stays
    /// reconfigurable and the caller may resend configuration.
    #[error("configuration failed: {0}")]
    Configuration(String),

    /// A request was submitted before the session reached Ready. Caller bug.
    #[error("session is not ready")]
    NotReady,

    /// The request discriminator was not recognized.
    #[error("unknown request")]
    UnknownMethod,

    /// The compute call itself failed. Reported to the caller; the session
    /// stays Ready.
    #[error("{0}")]
    Engine(String),

    /// The bridge or proxy could not reach the upstream at all.
    #[error("{0}")]
    Transport(String),

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned {status} {text}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Canonical status text, possibly empty.
        text: String,
    },
}

/// Sanitize an error message for the UI.
///
/// Takes only the first line and replaces embedded double quotes with single
/// quotes so the result can be dropped into a JSON string verbatim.
pub fn sanitize(message: &str) -> String {
    message
        .lines()
        .next()
        .unwrap_or_default()
        .replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_takes_first_line_only() {
        assert_eq!(sanitize("boom\nline2\nline3"), "boom");
    }

    #[test]
    fn sanitize_normalizes_quotes() {
        assert_eq!(sanitize("boom \"quoted\"\nline2"), "boom 'quoted'");
    }

    #[test]
    fn sanitize_empty_input() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn sanitized_message_embeds_in_json() {
        let msg = sanitize("upstream said \"no\"\ndetails follow");
        let framed = format!("{{\"id\":1,\"error\":\"{msg}\"}}");
        let parsed: serde_json::Value = serde_json::from_str(&framed).unwrap();
        assert_eq!(parsed["error"], "upstream said 'no'");
    }

    #[test]
    fn error_display_matches_protocol_wording() {
        assert_eq!(Error::UnknownMethod.to_string(), "unknown request");
        assert_eq!(Error::NotReady.to_string(), "session is not ready");
        let http = Error::Http { status: 503, text: "Service Unavailable".into() };
        assert_eq!(http.to_string(), "upstream returned 503 Service Unavailable");
    }
}

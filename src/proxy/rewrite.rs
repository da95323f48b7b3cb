//! Upstream target reconstruction for the forwarding proxy.
//!
//! The proxy exposes no route table. Every inbound path+query is rewritten
//! into a fully qualified upstream URL:
//!
//! ```text
//! /https://host/p?q   ->  https://host/p?q   (explicit scheme, verbatim)
//! /http://host/p      ->  http://host/p      (explicit scheme, verbatim)
//! /host/p?q           ->  https://host/p?q   (default scheme)
//! /<override>/p       ->  http://<override>/p (per-prefix scheme override)
//! ```
//!
//! Scheme overrides are an ordered lookup table checked before the default
//! rule. The table is configuration data: upstreams that do not terminate TLS
//! get an entry instead of a code branch.

use serde::{Deserialize, Serialize};

/// Upstream URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP, for upstreams that do not terminate TLS.
    Http,
    /// HTTPS, the default.
    Https,
}

impl Scheme {
    /// URL scheme string without the `://` separator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// A (host-prefix, scheme) override entry.
///
/// The prefix is matched against the inbound path with its leading slash
/// stripped, so `unstable.sepolia.beacon-api.nimbus.team` matches requests
/// like `/unstable.sepolia.beacon-api.nimbus.team/eth/v1/...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeOverride {
    /// Path prefix (host, optionally host + leading path segments).
    pub prefix: String,
    /// Scheme to use for matching targets.
    pub scheme: Scheme,
}

/// Built-in override table.
///
/// The nimbus sepolia beacon API is served over plain HTTP only.
#[must_use]
pub fn default_overrides() -> Vec<SchemeOverride> {
    vec![SchemeOverride {
        prefix: "unstable.sepolia.beacon-api.nimbus.team".to_string(),
        scheme: Scheme::Http,
    }]
}

/// Reconstruct the upstream URL from an inbound path+query.
///
/// `path_and_query` is everything after the proxy's own host, including the
/// leading slash. Overrides are checked in order; the first matching prefix
/// wins.
#[must_use]
pub fn rewrite_target(path_and_query: &str, overrides: &[SchemeOverride]) -> String {
    if path_and_query.starts_with("/https://") || path_and_query.starts_with("/http://") {
        return path_and_query[1..].to_string();
    }

    let bare = path_and_query.strip_prefix('/').unwrap_or(path_and_query);
    for entry in overrides {
        if bare.starts_with(&entry.prefix) {
            return format!("{}://{}", entry.scheme.as_str(), bare);
        }
    }
    format!("https://{bare}")
}

//! Probe targets, classifications and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// URL scheme spoken by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one probe target. Results are matched back to targets by this
/// value, never by arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
}

impl ProbeTarget {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Base URL for this target. IPv6 literals are bracketed.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Url::parse(&format!("{}://{}:{}/", self.scheme, host, self.port))
    }

    /// Same host and scheme on a different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Total classification of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Server answered 200: serving requests.
    Ready,
    /// Server answered 503: present but still loading.
    Loading,
    /// Nothing answered on either endpoint.
    Down,
    /// Something answered, but not in a way we understand.
    Unknown,
}

impl Classification {
    /// Map an HTTP status code to a classification.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Classification::Ready,
            503 => Classification::Loading,
            _ => Classification::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ready => "ready",
            Classification::Loading => "loading",
            Classification::Down => "down",
            Classification::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub classification: Classification,
    /// HTTP status of the response that was classified, if one was read.
    pub status: Option<u16>,
    /// Path that produced the classified response.
    pub endpoint: Option<&'static str>,
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
    /// Short diagnostic for non-ready results.
    pub detail: Option<String>,
}

impl ProbeResult {
    /// Result for a target whose probe never completed (scan deadline).
    pub fn abandoned(target: ProbeTarget, latency: Duration) -> Self {
        Self {
            target,
            classification: Classification::Down,
            status: None,
            endpoint: None,
            latency,
            detail: Some("abandoned at scan deadline".to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classification == Classification::Ready
    }
}

pub(crate) fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

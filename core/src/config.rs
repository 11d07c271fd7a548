//! Client configuration.
//!
//! Every field is optional in serialized form; missing fields fall back to
//! `ClientConfig::default()`. Cookies are on by default so `get_cookie` has a
//! jar to read from.

use std::time::Duration;

use serde::Deserialize;

use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whole-exchange timeout in seconds. `None` or a non-positive value
    /// means no timeout.
    pub timeout_secs: Option<f64>,
    /// Accept invalid TLS certificates.
    pub insecure_ssl: bool,
    /// Proxy URL applied to every scheme.
    pub proxy: Option<String>,
    /// Keep a cookie jar on the client.
    pub cookies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            insecure_ssl: false,
            proxy: None,
            cookies: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(raw).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

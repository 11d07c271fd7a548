//! Error types for the HTTP bridge core.
//!
//! # Design
//! Every variant here is a recoverable runtime condition. The script layer
//! turns each of them into a `(nil, message)` pair, so the `Display` output is
//! what a script ends up reading. Caller-misuse conditions (wrong handle
//! type) are not represented here; they live in the script crate.

use thiserror::Error;

/// Errors returned by request construction, dispatch and client setup.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The method is not a valid HTTP token.
    #[error("net/http: invalid method {0:?}")]
    InvalidMethod(String),

    /// The URL could not be parsed as an absolute URL.
    #[error("parse {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The exchange failed before a response was received (DNS, connect,
    /// TLS, timeout, invalid header).
    #[error("{0}")]
    Transport(String),

    /// A response arrived but draining its body failed.
    #[error("reading response body: {0}")]
    BodyRead(String),

    /// The client could not be built from the given configuration.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

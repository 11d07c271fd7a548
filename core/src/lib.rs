//! Native side of the script HTTP bridge.
//!
//! # Overview
//! Holds everything a script handle wraps: the mutable `HttpRequest`, the
//! `Client` that dispatches it, and the `HttpResponse` it produces. The
//! script crate only converts between these types and script values.
//!
//! # Design
//! - Method, URL and body are validated and fixed when an `HttpRequest` is
//!   built; headers stay mutable until dispatch.
//! - Network I/O sits behind the `Transport` trait and cookie storage behind
//!   `CookieJar`, implemented with reqwest and its cookie store.
//! - Dispatch buffers the whole body and closes the response stream on every
//!   path before returning.
//! - All recoverable failures are `BridgeError` values, never panics.

pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod http;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use cookies::{Cookie, CookieJar, MemoryCookieJar};
pub use error::BridgeError;
pub use crate::http::{canonical_header_key, HttpRequest, HttpResponse, DEFAULT_USER_AGENT};
pub use transport::{read_response, RawResponse, ReqwestTransport, Transport};
pub use url::Url;

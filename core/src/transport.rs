//! The transport seam and response marshaling.
//!
//! # Design
//! `Transport` is the only place network I/O happens. It hands back a
//! `RawResponse` whose body is still a stream; `read_response` owns that
//! value, drains the body and drops the stream before returning on every
//! path, so a failed read never leaves a response open.

use std::error::Error as StdError;
use std::io::Read;

use http::HeaderMap;

use crate::error::BridgeError;
use crate::http::{canonical_header_key, HttpRequest, HttpResponse};

/// A response whose body has not been read yet.
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

/// Executes one request and returns the unread response.
///
/// Implementations may block for the whole exchange. Timeouts, redirects and
/// TLS policy belong to the implementation, not to callers.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse, BridgeError>;
}

/// `Transport` backed by a blocking reqwest client.
///
/// Request headers are sent as set. reqwest adds `Accept: */*` and, with
/// gzip enabled, `Accept-Encoding: gzip` when the request does not carry
/// them; a header set on the request always wins.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse, BridgeError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().to_vec());
        }

        let mut response = builder
            .send()
            .map_err(|e| BridgeError::Transport(error_chain(&e)))?;
        let status = response.status().as_u16();
        let headers = std::mem::take(response.headers_mut());
        Ok(RawResponse {
            status,
            headers,
            body: Box::new(response),
        })
    }
}

/// Drain a raw response into an `HttpResponse`.
///
/// The body stream is dropped before this function returns, whether or not
/// the read succeeded.
pub fn read_response(raw: RawResponse) -> Result<HttpResponse, BridgeError> {
    let RawResponse {
        status,
        headers,
        mut body,
    } = raw;
    let headers = first_header_values(&headers);

    let mut data = Vec::new();
    let read = body.read_to_end(&mut data);
    drop(body);
    read.map_err(|e| BridgeError::BodyRead(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body: data,
    })
}

/// One `(name, value)` per header name, keeping the first value only.
fn first_header_values(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            Some((
                canonical_header_key(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ))
        })
        .collect()
}

/// reqwest's `Display` stops at the outermost error; scripts get the causes too.
fn error_chain(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

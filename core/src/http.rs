//! HTTP request and response types handed across the script boundary.
//!
//! # Design
//! `HttpRequest` is plain data: it validates method and URL once at
//! construction and afterwards only its headers can change. The transport
//! turns it into a wire request at dispatch time, so header names and values
//! are checked by the transport rather than here.
//!
//! Header names are kept in canonical MIME form (`content-type` becomes
//! `Content-Type`) on both sides so scripts see the same spelling they set.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::Method;
use url::Url;

use crate::error::BridgeError;

/// `User-Agent` value every new request carries until a script overwrites it.
pub const DEFAULT_USER_AGENT: &str = concat!("httpbridge/", env!("CARGO_PKG_VERSION"));

const USER_AGENT: &str = "User-Agent";
const AUTHORIZATION: &str = "Authorization";

/// An HTTP request owned by a script handle.
///
/// Method, URL and body are fixed at construction. Headers are an ordered
/// list with unique, case-insensitive names.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Build a request and apply the default `User-Agent`.
    ///
    /// Any method token is accepted; the empty string and strings with
    /// non-token characters are rejected. The URL must be absolute.
    pub fn new(method: &str, url: &str, body: Option<&[u8]>) -> Result<Self, BridgeError> {
        // An empty method means GET.
        let method = if method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| BridgeError::InvalidMethod(method.to_string()))?
        };
        let url = Url::parse(url).map_err(|e| BridgeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut request = HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: body.map(<[u8]>::to_vec).unwrap_or_default(),
        };
        request.set_header(USER_AGENT, DEFAULT_USER_AGENT);
        Ok(request)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value under the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let key = canonical_header_key(name);
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((key, value.to_string())),
        }
    }

    /// Replace the `Authorization` header with HTTP basic credentials.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) {
        let token = STANDARD.encode(format!("{username}:{password}"));
        self.set_header(AUTHORIZATION, &format!("Basic {token}"));
    }
}

/// A fully buffered response, marshaled for the script side.
///
/// `headers` holds one entry per header name. When the server sent a header
/// more than once only the first value is kept; callers relying on repeated
/// headers such as `Set-Cookie` see just the first occurrence. Values that
/// are not valid UTF-8 are converted lossily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canonical MIME spelling of a header name: the first letter and every
/// letter following a hyphen are upper-cased, the rest lower-cased.
///
/// Names containing a space or other non-token byte are returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

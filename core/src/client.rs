//! The managed client a script dispatches through.
//!
//! # Design
//! `Client` pairs a `Transport` with an optional `CookieJar`. `Client::new`
//! wires both to one blocking reqwest client sharing a `MemoryCookieJar`,
//! so cookies set by responses are visible to `cookies`. Tests and embedders
//! can assemble a client from their own parts instead.
//!
//! Nothing here adds locking or timeouts: the transport's own guarantees are
//! the only ones.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::cookies::{Cookie, CookieJar, MemoryCookieJar};
use crate::error::BridgeError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{read_response, ReqwestTransport, Transport};

pub struct Client {
    transport: Box<dyn Transport>,
    jar: Option<Arc<dyn CookieJar>>,
}

impl Client {
    /// Build a reqwest-backed client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, BridgeError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure_ssl);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| BridgeError::Config(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let jar = if config.cookies {
            let jar = Arc::new(MemoryCookieJar::new());
            builder = builder.cookie_provider(Arc::clone(&jar));
            Some(jar as Arc<dyn CookieJar>)
        } else {
            None
        };

        let inner = builder
            .build()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(Self {
            transport: Box::new(ReqwestTransport::new(inner)),
            jar,
        })
    }

    /// Assemble a client from an arbitrary transport, with no cookie jar.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            jar: None,
        }
    }

    pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Execute `request` and buffer the whole response.
    ///
    /// Blocks for the duration of the exchange. Transport failures and body
    /// read failures are both returned as errors; the response stream is
    /// closed before this returns either way.
    pub fn do_request(&self, request: &HttpRequest) -> Result<HttpResponse, BridgeError> {
        debug!("dispatching {} {}", request.method(), request.url());
        let raw = self.transport.execute(request).map_err(|e| {
            warn!("{} {} failed: {e}", request.method(), request.url());
            e
        })?;
        let response = read_response(raw)?;
        debug!(
            "{} {} -> {} ({} bytes)",
            request.method(),
            request.url(),
            response.status,
            response.body.len()
        );
        Ok(response)
    }

    /// Cookies the jar holds for `url`.
    ///
    /// Returns `None` when the client has no jar, when the jar has nothing
    /// for the URL, and when `url` does not parse. The parse failure is only
    /// logged.
    pub fn cookies(&self, url: &str) -> Option<Vec<Cookie>> {
        let jar = self.jar.as_ref()?;
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("cookie lookup for unparseable url {url:?}: {e}");
                return None;
            }
        };
        jar.cookies_for(&parsed)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cookies", &self.jar.is_some())
            .finish_non_exhaustive()
    }
}

//! Cookie jar lookup.
//!
//! `CookieJar` is the read side of whatever store the client writes
//! `Set-Cookie` responses into. `None` means the jar had nothing for the URL;
//! an empty `Vec` is never returned by `MemoryCookieJar`.
//!
//! `MemoryCookieJar` is also the client's `reqwest::cookie::CookieStore`, so
//! the pairs a lookup returns are the ones the client would send, read
//! straight from the store rather than re-parsed from a `Cookie` header.

use std::sync::{PoisonError, RwLock};

use cookie_store::RawCookie;
use log::trace;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

pub trait CookieJar: Send + Sync {
    /// Cookies that would be sent with a request to `url`.
    fn cookies_for(&self, url: &Url) -> Option<Vec<Cookie>>;
}

/// In-memory RFC 6265 cookie store shared between a reqwest client and
/// cookie lookups.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    store: RwLock<cookie_store::CookieStore>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one `Set-Cookie` header value as if it came from `url`.
    /// Values that do not parse as a cookie are ignored.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        if let Ok(cookie) = RawCookie::parse(cookie.to_string()) {
            self.write().store_response_cookies(std::iter::once(cookie), url);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, cookie_store::CookieStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookies_for(&self, url: &Url) -> Option<Vec<Cookie>> {
        let cookies: Vec<Cookie> = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| Cookie {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        if cookies.is_empty() {
            None
        } else {
            Some(cookies)
        }
    }
}

impl CookieStore for MemoryCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies: Vec<RawCookie<'static>> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| RawCookie::parse(value.to_string()).ok())
            .collect();
        trace!("storing {} cookie(s) from {url}", cookies.len());
        self.write().store_response_cookies(cookies.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

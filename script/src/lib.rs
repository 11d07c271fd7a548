//! Script-facing surface of the HTTP bridge.
//!
//! # Overview
//! Exposes request construction, request mutation, dispatch and cookie
//! lookup to a dynamically-typed script runtime. Native objects never cross
//! the boundary: scripts hold opaque handles, and responses come back as
//! plain tables.
//!
//! ```text
//! local req, err = http.request("GET", "http://localhost:3000/echo")
//! req:header_set("X-Trace", 42)
//! req:set_basic_auth("user", "pass")
//! local client = http.client({ timeout = 5 })
//! local resp, err = client:do_request(req)
//! -- resp = { code = 200, body = "...", headers = { ["Content-Type"] = "..." } }
//! local cookies = client:get_cookie("http://localhost:3000/")
//! ```
//!
//! # Design
//! - Recoverable failures (bad method or URL, transport errors, body read
//!   errors, client build errors) return `[nil, message]`.
//! - Caller misuse (a wrong or released handle, a missing argument) raises a
//!   `ScriptError::Argument` naming the offending position.
//! - Setter arguments are stringified with `Value::to_script_string`, never
//!   rejected for their type.
//! - Response headers carry one value per name; repeated headers surface
//!   only their first value.

pub mod error;
pub mod handles;
pub mod state;
pub mod types;

use httpbridge_core::{Client, ClientConfig, Cookie, HttpRequest, HttpResponse};

pub use error::ScriptError;
pub use handles::{HandleRegistry, UserData, CLIENT_TYPE, REQUEST_TYPE};
pub use state::{Args, Module, NativeFn, State};
pub use types::{nil_error, Handle, MultiValue, Table, Value};

/// The `http` module: `request`, `client` and the methods of both handle types.
pub const HTTP_MODULE: Module = Module {
    functions: &[("request", new_request), ("client", new_client)],
    methods: &[
        (
            REQUEST_TYPE,
            &[
                ("set_basic_auth", request_set_basic_auth),
                ("header_set", request_header_set),
            ],
        ),
        (
            CLIENT_TYPE,
            &[
                ("do_request", client_do_request),
                ("get_cookie", client_get_cookie),
            ],
        ),
    ],
};

impl State {
    /// A state with the `http` module registered.
    pub fn with_http() -> Self {
        let mut state = State::new();
        state.register(&HTTP_MODULE);
        state
    }
}

// ---------------------------------------------------------------------------
// Request handle
// ---------------------------------------------------------------------------

/// `request(method, url, body?) -> request | nil, err`
///
/// A missing or `nil` body sends an empty body. The new request already
/// carries the default `User-Agent`.
pub fn new_request(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("request", args);
    let method = args.check_string(1)?;
    let url = args.check_string(2)?;
    let body = args.opt_bytes(3)?;

    Ok(match HttpRequest::new(&method, &url, body.as_deref()) {
        Ok(request) => vec![state.create_userdata(request)],
        Err(e) => nil_error(e),
    })
}

/// `request:set_basic_auth(username, password)`
pub fn request_set_basic_auth(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("set_basic_auth", args);
    let request = state.check_userdata_mut::<HttpRequest>(&args, 1)?;
    let username = args.check_any(2)?.to_script_string();
    let password = args.check_any(3)?.to_script_string();
    request.set_basic_auth(&username, &password);
    Ok(Vec::new())
}

/// `request:header_set(key, value)`
pub fn request_header_set(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("header_set", args);
    let request = state.check_userdata_mut::<HttpRequest>(&args, 1)?;
    let key = args.check_any(2)?.to_script_string();
    let value = args.check_any(3)?.to_script_string();
    request.set_header(&key, &value);
    Ok(Vec::new())
}

// ---------------------------------------------------------------------------
// Client handle
// ---------------------------------------------------------------------------

/// `client(options?) -> client | nil, err`
///
/// Options: `timeout` (seconds), `insecure_ssl`, `proxy`, `cookies`.
pub fn new_client(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("client", args);
    let mut config = ClientConfig::default();
    if let Some(options) = args.opt_table(1)? {
        if let Some(timeout) = option(&args, options, "timeout", as_number)? {
            config.timeout_secs = Some(timeout);
        }
        if let Some(insecure) = option(&args, options, "insecure_ssl", as_bool)? {
            config.insecure_ssl = insecure;
        }
        if let Some(proxy) = option(&args, options, "proxy", as_string)? {
            config.proxy = Some(proxy);
        }
        if let Some(cookies) = option(&args, options, "cookies", as_bool)? {
            config.cookies = cookies;
        }
    }

    Ok(match Client::new(&config) {
        Ok(client) => vec![state.create_userdata(client)],
        Err(e) => nil_error(e),
    })
}

/// `client:do_request(request) -> response | nil, err`
///
/// Blocks until the whole response body has been read.
pub fn client_do_request(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("do_request", args);
    let client = state.check_userdata::<Client>(&args, 1)?;
    let request = state.check_userdata::<HttpRequest>(&args, 2)?;

    Ok(match client.do_request(request) {
        Ok(response) => vec![response_table(response)],
        Err(e) => nil_error(e),
    })
}

/// `client:get_cookie(url) -> {name = value, ...} | nil`
pub fn client_get_cookie(state: &mut State, args: &[Value]) -> Result<MultiValue, ScriptError> {
    let args = Args::new("get_cookie", args);
    let client = state.check_userdata::<Client>(&args, 1)?;
    let url = args.check_string(2)?;

    Ok(match client.cookies(&url) {
        Some(cookies) => vec![cookie_table(cookies)],
        None => vec![Value::Nil],
    })
}

fn response_table(response: HttpResponse) -> Value {
    let headers: Table = response.headers.into_iter().collect();
    let result = Table::new();
    result.set("code", i64::from(response.status));
    result.set("body", response.body);
    result.set("headers", headers);
    Value::Table(result)
}

/// Later cookies with the same name replace earlier ones.
fn cookie_table(cookies: Vec<Cookie>) -> Value {
    Value::Table(cookies.into_iter().map(|c| (c.name, c.value)).collect())
}

// ---------------------------------------------------------------------------
// Option fields
// ---------------------------------------------------------------------------

/// Read `options[key]`; `nil` or absent is `None`, a wrong type is an
/// argument error against the options table.
fn option<T>(
    args: &Args<'_>,
    options: &Table,
    key: &str,
    convert: fn(&Value) -> Option<T>,
) -> Result<Option<T>, ScriptError> {
    match options.get(key) {
        None | Some(Value::Nil) => Ok(None),
        Some(value) => convert(&value).map(Some).ok_or_else(|| {
            args.error(1, format!("{key}: unexpected {}", value.type_name()))
        }),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use httpbridge_core::{BridgeError, CookieJar, RawResponse, Transport, Url, DEFAULT_USER_AGENT};
    use std::io::Cursor;
    use std::sync::Arc;

    struct FixedResponse;

    impl Transport for FixedResponse {
        fn execute(&self, request: &HttpRequest) -> Result<RawResponse, BridgeError> {
            if request.url().host_str() == Some("unreachable.invalid") {
                return Err(BridgeError::Transport("dns error".to_string()));
            }
            let mut headers = http::HeaderMap::new();
            headers.insert("content-type", "text/plain".parse().unwrap());
            headers.append("set-cookie", "a=1".parse().unwrap());
            headers.append("set-cookie", "b=2".parse().unwrap());
            Ok(RawResponse {
                status: 200,
                headers,
                body: Box::new(Cursor::new(b"ok".to_vec())),
            })
        }
    }

    struct FixedJar(Vec<(&'static str, &'static str)>);

    impl CookieJar for FixedJar {
        fn cookies_for(&self, _url: &Url) -> Option<Vec<Cookie>> {
            if self.0.is_empty() {
                return None;
            }
            Some(
                self.0
                    .iter()
                    .map(|(name, value)| Cookie {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            )
        }
    }

    fn request(state: &mut State, url: &str) -> Value {
        let ret = state.call("request", &[Value::from("GET"), Value::from(url)]).unwrap();
        assert_eq!(ret.len(), 1);
        ret.into_iter().next().unwrap()
    }

    fn stub_client(state: &mut State, cookies: Vec<(&'static str, &'static str)>) -> Value {
        let client = Client::with_transport(FixedResponse).with_cookie_jar(Arc::new(FixedJar(cookies)));
        state.create_userdata(client)
    }

    fn header(state: &State, req: &Value, name: &str) -> Option<String> {
        let handle = req.as_handle().unwrap();
        state
            .handles()
            .get::<HttpRequest>(handle)
            .unwrap()
            .header(name)
            .map(str::to_string)
    }

    #[test]
    fn new_request_returns_handle_with_default_user_agent() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        assert_eq!(state.handles().type_name(req.as_handle().unwrap()), Some(REQUEST_TYPE));
        assert_eq!(header(&state, &req, "User-Agent").as_deref(), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn new_request_malformed_url_returns_nil_and_message() {
        let mut state = State::with_http();
        let ret = state
            .call("request", &[Value::from("GET"), Value::from("not a url")])
            .unwrap();
        assert_eq!(ret.len(), 2);
        assert!(ret[0].is_nil());
        assert!(!ret[1].as_str().unwrap().is_empty());
        assert!(state.handles().is_empty());
    }

    #[test]
    fn new_request_requires_method_and_url_strings() {
        let mut state = State::with_http();
        let err = state.call("request", &[Value::from("GET")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #2 to 'request' (string expected, got no value)"
        );
        let err = state
            .call("request", &[Value::from("GET"), Value::from("http://x/"), Value::from(true)])
            .unwrap_err();
        assert!(matches!(err, ScriptError::Argument { position: 3, .. }));
    }

    #[test]
    fn header_set_stringifies_and_overwrites() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        state
            .call_method(&req, "header_set", &[Value::from("X"), Value::from(1i64)])
            .unwrap();
        state
            .call_method(&req, "header_set", &[Value::from("x"), Value::from(2.5)])
            .unwrap();
        assert_eq!(header(&state, &req, "X").as_deref(), Some("2.5"));

        state
            .call_method(&req, "header_set", &[Value::from("User-Agent"), Value::from("mine")])
            .unwrap();
        assert_eq!(header(&state, &req, "User-Agent").as_deref(), Some("mine"));
    }

    #[test]
    fn header_set_missing_value_is_argument_error() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        let err = state
            .call_method(&req, "header_set", &[Value::from("X")])
            .unwrap_err();
        assert!(matches!(err, ScriptError::Argument { position: 3, .. }));
    }

    #[test]
    fn set_basic_auth_stringifies_credentials() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        state
            .call_method(&req, "set_basic_auth", &[Value::from("user"), Value::from(1234i64)])
            .unwrap();
        // base64("user:1234")
        assert_eq!(header(&state, &req, "Authorization").as_deref(), Some("Basic dXNlcjoxMjM0"));
    }

    #[test]
    fn setter_rejects_client_handle() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, Vec::new());
        let err = request_header_set(&mut state, &[client, Value::from("X"), Value::from("y")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'header_set' (http request expected, got http_client_ud)"
        );
    }

    #[test]
    fn do_request_marshals_response() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, Vec::new());
        let req = request(&mut state, "http://localhost/");

        let ret = state.call_method(&client, "do_request", &[req]).unwrap();
        assert_eq!(ret.len(), 1);
        let resp = ret[0].as_table().unwrap();
        assert_eq!(resp.get("code"), Some(Value::Integer(200)));
        assert_eq!(resp.get("body"), Some(Value::from("ok")));

        let headers = resp.get("headers").unwrap();
        let headers = headers.as_table().unwrap();
        assert_eq!(headers.get("Content-Type"), Some(Value::from("text/plain")));
        assert_eq!(headers.get("Set-Cookie"), Some(Value::from("a=1")));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn do_request_transport_failure_returns_nil_and_message() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, Vec::new());
        let req = request(&mut state, "http://unreachable.invalid/");
        let ret = state.call_method(&client, "do_request", &[req]).unwrap();
        assert_eq!(ret, nil_error("dns error"));
    }

    #[test]
    fn do_request_reports_first_mismatching_argument() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, Vec::new());
        let req = request(&mut state, "http://localhost/");

        let err = client_do_request(&mut state, &[req.clone(), client.clone()]).unwrap_err();
        assert!(matches!(err, ScriptError::Argument { position: 1, .. }));

        let err = client_do_request(&mut state, &[client.clone(), client]).unwrap_err();
        assert!(matches!(err, ScriptError::Argument { position: 2, .. }));

        state.release(&req);
        let client = stub_client(&mut state, Vec::new());
        let err = client_do_request(&mut state, &[client, req]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #2 to 'do_request' (http request expected, got released handle)"
        );
    }

    #[test]
    fn get_cookie_empty_jar_is_nil() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, Vec::new());
        let ret = state
            .call_method(&client, "get_cookie", &[Value::from("http://localhost/")])
            .unwrap();
        assert_eq!(ret, vec![Value::Nil]);
    }

    #[test]
    fn get_cookie_builds_mapping_last_duplicate_wins() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, vec![("a", "1"), ("b", "2"), ("a", "3")]);
        let ret = state
            .call_method(&client, "get_cookie", &[Value::from("http://localhost/")])
            .unwrap();
        let expected: Table = [("a", "3"), ("b", "2")].into_iter().collect();
        assert_eq!(ret, vec![Value::Table(expected)]);
    }

    #[test]
    fn get_cookie_unparseable_url_is_nil() {
        let mut state = State::with_http();
        let client = stub_client(&mut state, vec![("a", "1")]);
        let ret = state
            .call_method(&client, "get_cookie", &[Value::from("::bad")])
            .unwrap();
        assert_eq!(ret, vec![Value::Nil]);
    }

    #[test]
    fn new_client_reads_options() {
        let mut state = State::with_http();
        let options: Table = [("timeout", Value::from(5i64)), ("cookies", Value::from(false))]
            .into_iter()
            .collect();
        let ret = state.call("client", &[Value::Table(options)]).unwrap();
        assert_eq!(state.handles().type_name(ret[0].as_handle().unwrap()), Some(CLIENT_TYPE));

        let ret = state.call("client", &[]).unwrap();
        assert!(ret[0].as_handle().is_some());
    }

    #[test]
    fn new_client_rejects_wrong_option_type() {
        let mut state = State::with_http();
        let options: Table = [("timeout", "soon")].into_iter().collect();
        let err = state.call("client", &[Value::Table(options)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'client' (timeout: unexpected string)"
        );
    }

    #[test]
    fn new_client_bad_proxy_returns_nil_and_message() {
        let mut state = State::with_http();
        let options: Table = [("proxy", "http://[::1")].into_iter().collect();
        let ret = state.call("client", &[Value::Table(options)]).unwrap();
        assert_eq!(ret.len(), 2);
        assert!(ret[0].is_nil());
    }

    #[test]
    fn unknown_method_on_request() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        let err = state.call_method(&req, "do_request", &[]).unwrap_err();
        assert_eq!(
            err,
            ScriptError::UnknownFunction("http_request_ud:do_request".to_string())
        );
    }

    #[test]
    fn released_request_handle_frees_slot() {
        let mut state = State::with_http();
        let req = request(&mut state, "http://localhost/");
        assert_eq!(state.handles().len(), 1);
        assert!(state.release(&req));
        assert!(state.handles().is_empty());
        assert!(!state.release(&req));
    }
}

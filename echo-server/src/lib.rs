use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw: method, headers (lower-cased names, last value wins)
/// and the body as text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/plain", get(plain))
        .route("/multi", get(multi))
        .route("/cookies/set", get(set_cookies))
        .route("/status/{code}", get(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        body,
    })
}

async fn plain() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "ok")
}

async fn multi() -> impl IntoResponse {
    let x_multi = HeaderName::from_static("x-multi");
    (
        AppendHeaders([
            (x_multi.clone(), "one"),
            (x_multi, "two"),
            (header::SET_COOKIE, "first=1; Path=/"),
            (header::SET_COOKIE, "second=2; Path=/"),
        ]),
        "multi",
    )
}

/// Every query pair becomes its own `Set-Cookie` scoped to `/`.
async fn set_cookies(Query(pairs): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    let cookies: Vec<(HeaderName, String)> = pairs
        .into_iter()
        .map(|(name, value)| (header::SET_COOKIE, format!("{name}={value}; Path=/")))
        .collect();
    (AppendHeaders(cookies), "cookies set")
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")),
        Err(_) => (StatusCode::BAD_REQUEST, format!("bad status {code}")),
    }
}

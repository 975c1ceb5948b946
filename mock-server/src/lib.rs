use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Longest delay `/delay/{ms}` will honor.
pub const MAX_DELAY_MS: u64 = 10_000;

/// Largest body `/bytes/{n}` will produce.
pub const MAX_BYTES: usize = 1 << 20;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAgent {
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cookies {
    pub cookie: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headers {
    pub headers: BTreeMap<String, String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/user-agent", get(user_agent))
        .route("/headers", get(headers))
        .route("/cookies", get(cookies))
        .route("/echo", post(echo))
        .route("/status/{code}", get(status).post(status))
        .route("/delay/{ms}", get(delay))
        .route("/bytes/{n}", get(bytes))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn user_agent(headers: HeaderMap) -> Json<UserAgent> {
    Json(UserAgent {
        user_agent: header_str(&headers, header::USER_AGENT).unwrap_or_default(),
    })
}

async fn headers(headers: HeaderMap) -> Json<Headers> {
    let headers = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Json(Headers { headers })
}

async fn cookies(headers: HeaderMap) -> Json<Cookies> {
    Json(Cookies {
        cookie: header_str(&headers, header::COOKIE),
    })
}

/// Replies with the request body and content type unchanged.
async fn echo(headers: HeaderMap, body: Bytes) -> (StatusCode, [(header::HeaderName, String); 1], Bytes) {
    let content_type = header_str(&headers, header::CONTENT_TYPE)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn delay(Path(ms): Path<u64>) -> Result<String, StatusCode> {
    if ms > MAX_DELAY_MS {
        return Err(StatusCode::BAD_REQUEST);
    }
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(format!("delayed {ms}ms"))
}

/// `n` bytes cycling through `a..=z`.
async fn bytes(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_BYTES {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(pattern(n))
}

pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| b'a' + (i % 26) as u8).collect()
}

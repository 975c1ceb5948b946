use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, pattern, Cookies, Headers, UserAgent};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- user-agent / headers / cookies ---

#[tokio::test]
async fn user_agent_is_echoed() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/user-agent")
                .header(http::header::USER_AGENT, "test")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ua: UserAgent = body_json(resp).await;
    assert_eq!(ua.user_agent, "test");
}

#[tokio::test]
async fn missing_user_agent_is_empty() {
    let resp = app().oneshot(get("/user-agent")).await.unwrap();
    let ua: UserAgent = body_json(resp).await;
    assert!(ua.user_agent.is_empty());
}

#[tokio::test]
async fn headers_are_listed_lowercase() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/headers")
                .header("X-Trace", "abc")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers: Headers = body_json(resp).await;
    assert_eq!(headers.headers.get("x-trace").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn cookie_header_is_reported() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/cookies")
                .header(http::header::COOKIE, "gd=1;")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let cookies: Cookies = body_json(resp).await;
    assert_eq!(cookies.cookie.as_deref(), Some("gd=1;"));
}

// --- echo ---

#[tokio::test]
async fn echo_returns_body_and_content_type() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body("k=v".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/x-www-form-urlencoded"
    );
    assert_eq!(body_bytes(resp).await, "k=v");
}

#[tokio::test]
async fn echo_rejects_get() {
    let resp = app().oneshot(get("/echo")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code() {
    for code in [200u16, 204, 404, 503] {
        let resp = app().oneshot(get(&format!("/status/{code}"))).await.unwrap();
        assert_eq!(resp.status().as_u16(), code);
    }
}

#[tokio::test]
async fn status_out_of_range_is_400() {
    let resp = app().oneshot(get("/status/1000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delay / bytes ---

#[tokio::test]
async fn delay_waits_then_replies() {
    let started = std::time::Instant::now();
    let resp = app().oneshot(get("/delay/30")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() >= std::time::Duration::from_millis(30));
}

#[tokio::test]
async fn delay_over_limit_is_400() {
    let resp = app().oneshot(get("/delay/999999")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bytes_returns_pattern() {
    let resp = app().oneshot(get("/bytes/100")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.to_vec(), pattern(100));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app().oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

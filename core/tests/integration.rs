//! End-to-end dispatch tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the engine and the
//! manager over real HTTP through `UreqTransport`. Each test builds its own
//! engine so shutdown behavior can be observed in isolation.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use netqueue_core::{
    DispatchEngine, EngineConfig, NetworkManager, Request, Response, SuccessPolicy,
    TransportConfig, TransportErrorKind,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config() -> EngineConfig {
    EngineConfig::default().with_idle_wait(Duration::from_millis(20))
}

fn engine_with(config: EngineConfig) -> DispatchEngine {
    let engine = DispatchEngine::new(config);
    engine.init().unwrap();
    engine
}

fn next_response(engine: &DispatchEngine) -> Response {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(resp) = engine.try_recv() {
            return resp;
        }
        assert!(Instant::now() < deadline, "no response within 10s");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn get_user_agent_round_trip() {
    let addr = start_server();
    let engine = engine_with(config());
    assert!(!engine.has_response());

    let req = Request::get(format!("http://{addr}/user-agent"))
        .with_header("User-Agent: test")
        .with_tag("T1");
    engine.submit(req).unwrap();

    let resp = next_response(&engine);
    assert_eq!(resp.status(), 200);
    assert!(resp.success());
    assert!(resp.error().is_none());
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["user-agent"], "test");
    assert_eq!(resp.request().tag, "T1");

    engine.shutdown(false).unwrap();
}

#[test]
fn post_body_is_echoed() {
    let addr = start_server();
    let engine = engine_with(config());

    engine
        .submit(Request::post(format!("http://{addr}/echo"), "k=v").with_tag("P1"))
        .unwrap();

    let resp = next_response(&engine);
    assert!(resp.success());
    assert!(resp.text().contains("k=v"));
    assert_eq!(resp.tag(), "P1");
}

#[test]
fn many_requests_complete_in_submission_order() {
    let addr = start_server();
    let engine = engine_with(config());

    for i in 1..=10 {
        let req = Request::get(format!("http://{addr}/bytes/{i}")).with_tag(format!("N{i}"));
        engine.submit(req).unwrap();
    }
    for i in 1..=10 {
        let resp = next_response(&engine);
        assert_eq!(resp.tag(), format!("N{i}"));
        assert_eq!(resp.body(), mock_server::pattern(i).as_slice());
    }
    assert!(engine.try_recv().is_none());

    let report = engine.shutdown(false).unwrap();
    assert!(report.joined);
    assert_eq!(report.discarded_requests, 0);
    assert_eq!(report.discarded_responses, 0);
}

#[test]
fn large_body_is_streamed_completely() {
    let addr = start_server();
    let engine = engine_with(config());

    engine
        .submit(Request::get(format!("http://{addr}/bytes/200000")))
        .unwrap();

    let resp = next_response(&engine);
    assert!(resp.success());
    assert_eq!(resp.body().len(), 200_000);
    assert_eq!(resp.body(), mock_server::pattern(200_000).as_slice());
}

#[test]
fn non_200_status_is_preserved_and_policy_applied() {
    let addr = start_server();

    let strict = engine_with(config());
    strict
        .submit(Request::get(format!("http://{addr}/status/204")))
        .unwrap();
    strict
        .submit(Request::get(format!("http://{addr}/status/404")))
        .unwrap();

    let no_content = next_response(&strict);
    assert_eq!(no_content.status(), 204);
    assert!(!no_content.success());
    assert!(no_content.error().is_none());

    let not_found = next_response(&strict);
    assert_eq!(not_found.status(), 404);
    assert!(!not_found.success());

    let lenient = engine_with(
        config().with_transport(TransportConfig::default().with_success_policy(SuccessPolicy::Any2xx)),
    );
    lenient
        .submit(Request::get(format!("http://{addr}/status/204")))
        .unwrap();
    let resp = next_response(&lenient);
    assert_eq!(resp.status(), 204);
    assert!(resp.success());
}

#[test]
fn site_cookie_is_sent_when_configured() {
    let addr = start_server();

    let plain = engine_with(config());
    plain
        .submit(Request::get(format!("http://{addr}/cookies")))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(next_response(&plain).body()).unwrap();
    assert!(body["cookie"].is_null());

    let with_cookie =
        engine_with(config().with_transport(TransportConfig::default().with_site_cookie("gd=1;")));
    with_cookie
        .submit(Request::get(format!("http://{addr}/cookies")))
        .unwrap();
    let body: serde_json::Value =
        serde_json::from_slice(next_response(&with_cookie).body()).unwrap();
    assert_eq!(body["cookie"], "gd=1;");
}

#[test]
fn connection_refused_surfaces_as_failed_response() {
    // Bind then drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let engine = engine_with(config());

    engine
        .submit(
            Request::get(format!("http://{addr}/"))
                .with_timeout(Duration::from_secs(2))
                .with_tag("DOWN"),
        )
        .unwrap();

    let resp = next_response(&engine);
    assert!(!resp.success());
    assert_eq!(resp.status(), 0);
    assert!(resp.body().is_empty());
    assert_eq!(resp.tag(), "DOWN");
    let err = resp.error().expect("transport error");
    assert_ne!(err.kind, TransportErrorKind::Setup);
}

#[test]
fn total_timeout_surfaces_as_timeout() {
    let addr = start_server();
    let engine = engine_with(config().with_transport(
        TransportConfig::default().with_total_timeout(Some(Duration::from_millis(200))),
    ));

    engine
        .submit(Request::get(format!("http://{addr}/delay/3000")))
        .unwrap();

    let resp = next_response(&engine);
    assert!(!resp.success());
    assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Timeout));
}

#[test]
fn malformed_header_never_reaches_the_network() {
    let addr = start_server();
    let engine = engine_with(config());

    engine
        .submit(Request::get(format!("http://{addr}/headers")).with_header("garbage"))
        .unwrap();

    let resp = next_response(&engine);
    assert!(!resp.success());
    assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Setup));
}

#[test]
fn forced_shutdown_discards_queued_requests() {
    let addr = start_server();
    let engine = engine_with(config());

    for i in 0..4 {
        engine
            .submit(Request::get(format!("http://{addr}/delay/300")).with_tag(format!("D{i}")))
            .unwrap();
    }
    // Wait until the first request is in flight.
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.pending_requests() == 4 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(2));
    }

    let report = engine.shutdown(true).unwrap();
    assert!(!report.joined);
    assert_eq!(report.discarded_requests, 3);

    // The in-flight request finishes in the background; nothing surfaces.
    thread::sleep(Duration::from_millis(600));
    assert!(!engine.has_response());
    assert!(engine.try_recv().is_none());
}

#[test]
fn idle_non_forced_shutdown_returns_promptly() {
    let engine = engine_with(config());
    let started = Instant::now();
    let report = engine.shutdown(false).unwrap();
    assert!(report.joined);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(engine.pending_requests(), 0);
    assert_eq!(engine.pending_responses(), 0);
}

#[test]
fn manager_visit_runs_callbacks_one_per_call() {
    let addr = start_server();
    let manager = NetworkManager::new(config()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let seen = Arc::clone(&seen);
        let req = Request::get(format!("http://{addr}/bytes/{}", i + 1))
            .with_tag(format!("V{i}"))
            .on_response(move |resp| {
                seen.lock()
                    .unwrap()
                    .push((resp.tag().to_string(), resp.body().len()));
            });
        manager.send(req).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while manager.pending_responses() < 3 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(5));
    }

    assert!(manager.visit());
    assert!(manager.visit());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("V0".to_string(), 1), ("V1".to_string(), 2)]
    );
    assert_eq!(manager.pending_responses(), 1);

    assert!(manager.visit());
    assert!(!manager.visit());
    assert_eq!(seen.lock().unwrap().len(), 3);
}

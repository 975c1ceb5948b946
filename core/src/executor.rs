//! Turns one `Request` into one fully populated `Response`.
//!
//! # Design
//! The executor owns the transport and the `TransportConfig` and nothing
//! else, so it carries no state from one request to the next. All failure
//! modes (unparseable headers, transport errors, rejected statuses, even a
//! panicking transport) are folded into the returned `Response`; nothing is
//! raised to the worker loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpMethod, Request, Response};
use crate::transport::{Transport, TransportCall};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    config: TransportConfig,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, config: TransportConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Execute `request` synchronously and wrap the outcome.
    pub fn execute(&self, request: Request) -> Response {
        let mut response = Response::new(request);
        self.execute_into(&mut response);
        response
    }

    /// Execute the request owned by `response` and record the outcome on it.
    pub(crate) fn execute_into(&self, response: &mut Response) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(response.request())));
        match outcome {
            Ok(Ok((status, body))) => {
                let success = self.config.success_policy.accepts(status);
                if !success {
                    debug!(status, "status rejected by success policy");
                }
                response.complete(status, success, body);
            }
            Ok(Err(err)) => {
                warn!(
                    request_id = %response.request().id(),
                    tag = %response.tag(),
                    kind = %err.kind,
                    error = %err.message,
                    "request failed"
                );
                response.fail(err);
            }
            Err(_) => {
                warn!(request_id = %response.request().id(), "transport panicked");
                response.fail(TransportError::new(
                    TransportErrorKind::Panic,
                    "transport panicked while executing the request",
                ));
            }
        }
    }

    fn run(&self, request: &Request) -> Result<(u16, Vec<u8>), TransportError> {
        let call = self.prepare(request)?;
        let mut body = Vec::new();
        let status = self
            .transport
            .perform(&call, &mut |chunk: &[u8]| body.extend_from_slice(chunk))?;
        Ok((status, body))
    }

    /// Build the transport call for `request` without performing it.
    pub fn prepare<'a>(&self, request: &'a Request) -> Result<TransportCall<'a>, TransportError> {
        if request.url.is_empty() {
            return Err(TransportError::setup("request has no URL"));
        }

        let mut headers = Vec::with_capacity(request.headers.len() + 2);
        if let Some(cookie) = &self.config.site_cookie {
            headers.push(("Cookie".to_string(), cookie.clone()));
        }
        for line in &request.headers {
            headers.push(parse_header(line)?);
        }

        let body = match request.method {
            HttpMethod::Get => None,
            HttpMethod::Post => {
                let has_content_type = headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
                if !has_content_type {
                    headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
                }
                Some(request.body.as_slice())
            }
        };

        Ok(TransportCall {
            method: request.method,
            url: &request.url,
            headers,
            proxy: request.proxy.as_deref().filter(|p| !p.is_empty()),
            connect_timeout: request.timeout,
            total_timeout: self.config.total_timeout,
            body,
            verify_tls: self.config.verify_tls,
        })
    }
}

/// Split a raw `"Name: value"` header line.
pub fn parse_header(line: &str) -> Result<(String, String), TransportError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| TransportError::setup(format!("malformed header {line:?}")))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(TransportError::setup(format!("malformed header {line:?}")));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuccessPolicy;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the prepared call and replies with a fixed status and chunks.
    struct Scripted {
        status: u16,
        chunks: Vec<&'static [u8]>,
        seen: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl Scripted {
        fn new(status: u16, chunks: Vec<&'static [u8]>) -> Arc<Self> {
            Arc::new(Self {
                status,
                chunks,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for Scripted {
        fn perform(
            &self,
            call: &TransportCall<'_>,
            sink: &mut dyn FnMut(&[u8]),
        ) -> Result<u16, TransportError> {
            self.seen.lock().unwrap().push(call.headers.clone());
            for chunk in &self.chunks {
                sink(chunk);
            }
            Ok(self.status)
        }
    }

    struct Exploding;

    impl Transport for Exploding {
        fn perform(
            &self,
            _call: &TransportCall<'_>,
            _sink: &mut dyn FnMut(&[u8]),
        ) -> Result<u16, TransportError> {
            panic!("boom");
        }
    }

    struct Refused;

    impl Transport for Refused {
        fn perform(
            &self,
            _call: &TransportCall<'_>,
            _sink: &mut dyn FnMut(&[u8]),
        ) -> Result<u16, TransportError> {
            Err(TransportError::new(TransportErrorKind::Connect, "connection refused"))
        }
    }

    fn executor(transport: Arc<dyn Transport>) -> RequestExecutor {
        RequestExecutor::new(transport, TransportConfig::default())
    }

    #[test]
    fn chunks_are_appended_in_order() {
        let transport = Scripted::new(200, vec![b"he", b"ll", b"o"]);
        let resp = executor(transport).execute(Request::get("http://x/").with_tag("T1"));
        assert!(resp.success());
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), b"hello");
        assert_eq!(resp.tag(), "T1");
    }

    #[test]
    fn cookie_goes_before_caller_headers() {
        let transport = Scripted::new(200, vec![]);
        let config = TransportConfig::default().with_site_cookie("gd=1;");
        let exec = RequestExecutor::new(transport.clone(), config);
        exec.execute(Request::get("http://x/").with_header("User-Agent: test"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            vec![
                ("Cookie".to_string(), "gd=1;".to_string()),
                ("User-Agent".to_string(), "test".to_string()),
            ]
        );
    }

    #[test]
    fn no_cookie_by_default() {
        let transport = Scripted::new(200, vec![]);
        executor(transport.clone()).execute(Request::get("http://x/"));
        assert!(transport.seen.lock().unwrap()[0].is_empty());
    }

    #[test]
    fn non_200_fails_under_exact_policy_but_keeps_status() {
        let resp = executor(Scripted::new(204, vec![])).execute(Request::get("http://x/"));
        assert!(!resp.success());
        assert_eq!(resp.status(), 204);
        assert!(resp.error().is_none());
    }

    #[test]
    fn any_2xx_policy_accepts_204() {
        let config = TransportConfig::default().with_success_policy(SuccessPolicy::Any2xx);
        let exec = RequestExecutor::new(Scripted::new(204, vec![]), config);
        assert!(exec.execute(Request::get("http://x/")).success());
    }

    #[test]
    fn malformed_header_is_a_setup_failure() {
        let transport = Scripted::new(200, vec![b"never"]);
        let resp = executor(transport.clone())
            .execute(Request::get("http://x/").with_header("no colon here"));
        assert!(!resp.success());
        assert_eq!(resp.status(), 0);
        assert!(resp.body().is_empty());
        assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Setup));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_url_is_a_setup_failure() {
        let resp = executor(Scripted::new(200, vec![])).execute(Request::new());
        assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Setup));
    }

    #[test]
    fn transport_error_is_absorbed() {
        let resp = executor(Arc::new(Refused)).execute(Request::get("http://x/").with_tag("R"));
        assert!(!resp.success());
        assert_eq!(resp.status(), 0);
        assert_eq!(resp.tag(), "R");
        assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Connect));
    }

    #[test]
    fn panicking_transport_yields_failed_response() {
        let resp = executor(Arc::new(Exploding)).execute(Request::get("http://x/").with_tag("P"));
        assert!(!resp.success());
        assert_eq!(resp.tag(), "P");
        assert_eq!(resp.error().map(|e| e.kind), Some(TransportErrorKind::Panic));
    }

    #[test]
    fn post_defaults_to_form_content_type() {
        let exec = executor(Scripted::new(200, vec![]));
        let req = Request::post("http://x/echo", "k=v");
        let call = exec.prepare(&req).unwrap();
        assert_eq!(call.body, Some(&b"k=v"[..]));
        assert!(call
            .headers
            .contains(&("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())));
    }

    #[test]
    fn post_keeps_caller_content_type() {
        let exec = executor(Scripted::new(200, vec![]));
        let req = Request::post("http://x/echo", "{}").with_header("content-type: application/json");
        let call = exec.prepare(&req).unwrap();
        assert_eq!(call.headers.len(), 1);
        assert_eq!(call.headers[0].1, "application/json");
    }

    #[test]
    fn get_ignores_body_and_carries_timeouts() {
        let exec = executor(Scripted::new(200, vec![]));
        let mut req = Request::get("http://x/")
            .with_timeout(Duration::from_secs(5))
            .with_proxy("");
        req.body = b"ignored".to_vec();
        let call = exec.prepare(&req).unwrap();
        assert!(call.body.is_none());
        assert!(call.proxy.is_none());
        assert_eq!(call.connect_timeout, Duration::from_secs(5));
        assert_eq!(call.total_timeout, Some(Duration::from_secs(300)));
        assert!(call.verify_tls);
    }

    #[test]
    fn parse_header_trims_whitespace() {
        assert_eq!(
            parse_header("  X-Id :  42 ").unwrap(),
            ("X-Id".to_string(), "42".to_string())
        );
        assert!(parse_header("Bad Name: v").is_err());
        assert!(parse_header(": v").is_err());
    }
}

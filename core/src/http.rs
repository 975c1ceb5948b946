//! Request and response values that travel through the dispatch queues.
//!
//! # Design
//! A `Request` is plain data the caller fills in before `send`. Submitting
//! moves it into the engine, so it cannot be mutated afterwards. The worker
//! wraps each dequeued request in a `Response`, which owns the request until
//! the caller drops the response. That keeps the tag, flag and id reachable
//! from the result without any shared ownership.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::error::TransportError;

/// Default connect timeout for a new request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoked once by `NetworkManager::visit` with the completed response.
///
/// Runs on the visiting thread and should return quickly.
pub type ResponseCallback = Box<dyn FnOnce(&Response) + Send + 'static>;

/// An HTTP request described as plain data.
///
/// Headers are raw `"Name: value"` lines, applied in order after any
/// configured site cookie.
pub struct Request {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<String>,
    pub proxy: Option<String>,
    /// Connect timeout for this request.
    pub timeout: Duration,
    /// Sent as the request body for `Post`, ignored for `Get`.
    pub body: Vec<u8>,
    /// Caller-defined correlation id, handed back on the response.
    pub tag: String,
    /// Free-form caller flag, handed back on the response.
    pub flag: i32,
    id: Uuid,
    callback: Option<ResponseCallback>,
}

impl Request {
    pub fn new() -> Self {
        Self {
            method: HttpMethod::Get,
            url: String::new(),
            headers: Vec::new(),
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            body: Vec::new(),
            tag: String::new(),
            flag: 0,
            id: Uuid::new_v4(),
            callback: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::new()
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: body.into(),
            ..Self::new()
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_flag(mut self, flag: i32) -> Self {
        self.flag = flag;
        self
    }

    pub fn add_header(&mut self, header: impl Into<String>) {
        self.headers.push(header.into());
    }

    /// Register the callback `visit` will run for this request's response.
    pub fn on_response<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn set_callback(&mut self, callback: Option<ResponseCallback>) {
        self.callback = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Unique id assigned at creation, used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn take_callback(&mut self) -> Option<ResponseCallback> {
        self.callback.take()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .field("body_len", &self.body.len())
            .field("tag", &self.tag)
            .field("flag", &self.flag)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// The outcome of one executed request.
///
/// Only the worker builds responses, and only fully populated ones are ever
/// queued for the caller.
#[derive(Debug)]
pub struct Response {
    success: bool,
    status: u16,
    body: Vec<u8>,
    error: Option<TransportError>,
    request: Request,
}

impl Response {
    pub(crate) fn new(request: Request) -> Self {
        Self {
            success: false,
            status: 0,
            body: Vec::new(),
            error: None,
            request,
        }
    }

    /// True when the transport completed and the status was accepted by the
    /// configured `SuccessPolicy`.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Raw HTTP status, or 0 when none was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The transport failure, if the call did not complete.
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn tag(&self) -> &str {
        &self.request.tag
    }

    pub fn flag(&self) -> i32 {
        self.request.flag
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub(crate) fn complete(&mut self, status: u16, success: bool, body: Vec<u8>) {
        self.status = status;
        self.success = success;
        self.body = body;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: TransportError) {
        self.status = error.status;
        self.success = false;
        self.body.clear();
        self.error = Some(error);
    }

    pub(crate) fn take_callback(&mut self) -> Option<ResponseCallback> {
        self.request.take_callback()
    }
}

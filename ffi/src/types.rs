//! C-facing handle and enum types.
//!
//! # Design
//! Managers and requests are boxed Rust wrappers the C side only ever sees
//! as opaque pointers. Responses are handed out as `*const NqResponse`, a
//! zero-sized marker that is really a `core::Response` behind the pointer;
//! that lets a callback borrow a queued response without copying it.
//! Status codes and error kinds are `#[repr(C)]` enums with explicit
//! discriminants.

use std::ffi::c_void;
use std::sync::Arc;

use netqueue_core::{EngineError, HttpMethod, NetworkManager, Request, Response, TransportErrorKind};

/// Opaque handle to a `NetworkManager`. Each handle holds its own reference;
/// the engine shuts down when the last one is freed.
pub struct NqManager {
    pub(crate) inner: Arc<NetworkManager>,
}

impl NqManager {
    pub(crate) fn into_raw(inner: Arc<NetworkManager>) -> *mut Self {
        Box::into_raw(Box::new(NqManager { inner }))
    }
}

/// Opaque handle to a request being built. Consumed by `nq_send`.
pub struct NqRequest {
    pub(crate) inner: Request,
}

/// Opaque completed response.
///
/// Pointers from `nq_get_response` are owned by the caller and released with
/// `nq_response_free`. Pointers passed to a callback are borrowed for the
/// duration of the call only.
pub struct NqResponse {
    _private: [u8; 0],
}

impl NqResponse {
    pub(crate) fn into_raw(response: Response) -> *mut Self {
        Box::into_raw(Box::new(response)).cast()
    }

    pub(crate) fn borrowed(response: &Response) -> *const Self {
        (response as *const Response).cast()
    }

    /// # Safety
    /// `ptr` must be non-null and come from `into_raw` or `borrowed`.
    pub(crate) unsafe fn as_core<'a>(ptr: *const Self) -> &'a Response {
        unsafe { &*ptr.cast::<Response>() }
    }

    /// # Safety
    /// `ptr` must be non-null and come from `into_raw`, not yet freed.
    pub(crate) unsafe fn from_raw(ptr: *mut Self) -> Box<Response> {
        unsafe { Box::from_raw(ptr.cast::<Response>()) }
    }
}

/// Invoked by `nq_visit` on the visiting thread with the completed response
/// and the user data registered alongside it.
pub type NqCallback = Option<extern "C" fn(response: *const NqResponse, user_data: *mut c_void)>;

/// Caller-owned user data carried to the visiting thread.
pub(crate) struct UserData(*mut c_void);

// The pointer is only handed back to the C callback; the caller is
// responsible for whatever it points to.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        UserData(ptr)
    }

    pub(crate) fn get(&self) -> *mut c_void {
        self.0
    }
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NqHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<NqHttpMethod> for HttpMethod {
    fn from(m: NqHttpMethod) -> Self {
        match m {
            NqHttpMethod::Get => HttpMethod::Get,
            NqHttpMethod::Post => HttpMethod::Post,
        }
    }
}

/// Outcome of lifecycle calls (`nq_send`, `nq_shutdown`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NqStatus {
    Ok = 0,
    NullArg = 1,
    AlreadyInitialized = 2,
    NotInitialized = 3,
    Stopped = 4,
    ShutdownFromWorker = 5,
    Spawn = 6,
    Panic = 7,
    InvalidConfig = 8,
}

impl From<&EngineError> for NqStatus {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::AlreadyInitialized => NqStatus::AlreadyInitialized,
            EngineError::NotInitialized => NqStatus::NotInitialized,
            EngineError::Stopped => NqStatus::Stopped,
            EngineError::ShutdownFromWorker => NqStatus::ShutdownFromWorker,
            EngineError::Spawn(_) => NqStatus::Spawn,
            EngineError::Config(_) => NqStatus::InvalidConfig,
        }
    }
}

/// Transport failure category of a response; `None` when the exchange
/// completed, whatever its status.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NqErrorKind {
    None = 0,
    Setup = 1,
    Dns = 2,
    Connect = 3,
    Timeout = 4,
    Io = 5,
    Panic = 6,
    Other = 7,
}

impl From<TransportErrorKind> for NqErrorKind {
    fn from(kind: TransportErrorKind) -> Self {
        match kind {
            TransportErrorKind::Setup => NqErrorKind::Setup,
            TransportErrorKind::Dns => NqErrorKind::Dns,
            TransportErrorKind::Connect => NqErrorKind::Connect,
            TransportErrorKind::Timeout => NqErrorKind::Timeout,
            TransportErrorKind::Io => NqErrorKind::Io,
            TransportErrorKind::Panic => NqErrorKind::Panic,
            TransportErrorKind::Other => NqErrorKind::Other,
        }
    }
}

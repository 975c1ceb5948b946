//! C-ABI wrapper around `netqueue-core`.
//!
//! # Overview
//! Lets a C or C++ host drive the dispatch engine: create a manager, build
//! and send requests, then poll for responses or drain them through
//! callbacks from its own loop. No Rust types or runtimes leak through the
//! header.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Handles are `Box::into_raw` pointers; the caller frees each with the
//!   matching `nq_*_free` function. Null handles are rejected, never
//!   dereferenced.
//! - `nq_send` always consumes the request handle, whatever it returns.
//! - Strings returned to C are owned copies released with `nq_free_string`.
//!   Response bodies are borrowed and live as long as the response.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use netqueue_core::{EngineConfig, NetworkManager, Response};
use tracing::{error, warn};

pub use types::*;

/// Borrow a C string argument as UTF-8. `None` for null or invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn owned_c_string(s: &str) -> *mut c_char {
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Manager lifecycle
// ---------------------------------------------------------------------------

/// Create a manager and start its worker.
///
/// `config_json` may be null for the default configuration; otherwise it is
/// an `EngineConfig` JSON document. Returns null if the config is invalid or
/// the worker cannot start. Free with `nq_manager_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nq_manager_new(config_json: *const c_char) -> *mut NqManager {
    catch_unwind(|| {
        let config = if config_json.is_null() {
            EngineConfig::default()
        } else {
            let Some(raw) = (unsafe { str_arg(config_json) }) else {
                warn!("engine config is not valid UTF-8");
                return std::ptr::null_mut();
            };
            match EngineConfig::from_json(raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "rejected engine config");
                    return std::ptr::null_mut();
                }
            }
        };
        match NetworkManager::new(config) {
            Ok(manager) => NqManager::into_raw(std::sync::Arc::new(manager)),
            Err(e) => {
                warn!(error = %e, "failed to start network manager");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or_else(|_| {
        error!("panic in nq_manager_new");
        std::ptr::null_mut()
    })
}

/// Release a manager handle. Safe to call with null.
///
/// Freeing the last handle to a manager shuts its engine down.
#[unsafe(no_mangle)]
pub extern "C" fn nq_manager_free(manager: *mut NqManager) {
    if !manager.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(manager) });
        }));
    }
}

/// A new handle to the process-wide manager, created with the default
/// configuration on first use. Free the handle with `nq_manager_free`;
/// the shared manager itself stays installed until `nq_release_state`.
#[unsafe(no_mangle)]
pub extern "C" fn nq_shared_state() -> *mut NqManager {
    catch_unwind(|| match netqueue_core::shared_state() {
        Ok(manager) => NqManager::into_raw(manager),
        Err(e) => {
            warn!(error = %e, "failed to create shared network manager");
            std::ptr::null_mut()
        }
    })
    .unwrap_or_else(|_| {
        error!("panic in nq_shared_state");
        std::ptr::null_mut()
    })
}

/// Uninstall the process-wide manager. Returns whether one was installed.
#[unsafe(no_mangle)]
pub extern "C" fn nq_release_state() -> bool {
    catch_unwind(netqueue_core::release_state).unwrap_or(false)
}

/// Stop the manager's engine.
///
/// With `force` the call returns immediately and queued requests are
/// discarded; otherwise it waits for the worker to finish its current
/// request and exit.
#[unsafe(no_mangle)]
pub extern "C" fn nq_shutdown(manager: *const NqManager, force: bool) -> NqStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if manager.is_null() {
            return NqStatus::NullArg;
        }
        let manager = unsafe { &*manager };
        match manager.inner.shutdown(force) {
            Ok(_) => NqStatus::Ok,
            Err(e) => NqStatus::from(&e),
        }
    }))
    .unwrap_or(NqStatus::Panic)
}

// ---------------------------------------------------------------------------
// Request building
// ---------------------------------------------------------------------------

/// Start a new GET request with default settings.
///
/// Returns null if `manager` is null. Pass the result to `nq_send`, or free
/// it with `nq_request_free` if it is never sent.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_new(manager: *const NqManager) -> *mut NqRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if manager.is_null() {
            return std::ptr::null_mut();
        }
        let manager = unsafe { &*manager };
        let inner = manager.inner.new_request();
        Box::into_raw(Box::new(NqRequest { inner }))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free an unsent request. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_free(request: *mut NqRequest) {
    if !request.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(request) });
        }));
    }
}

/// Apply `f` to the request behind `request`, returning false for null.
fn with_request(request: *mut NqRequest, f: impl FnOnce(&mut NqRequest) -> bool) -> bool {
    if request.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| f(unsafe { &mut *request }))).unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_method(request: *mut NqRequest, method: NqHttpMethod) -> bool {
    with_request(request, |req| {
        req.inner.method = method.into();
        true
    })
}

/// Returns false if `url` is null or not UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_url(request: *mut NqRequest, url: *const c_char) -> bool {
    with_request(request, |req| match unsafe { str_arg(url) } {
        Some(url) => {
            req.inner.url = url.to_string();
            true
        }
        None => false,
    })
}

/// Route the request through `proxy`; null or empty clears it.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_proxy(request: *mut NqRequest, proxy: *const c_char) -> bool {
    with_request(request, |req| {
        if proxy.is_null() {
            req.inner.proxy = None;
            return true;
        }
        match unsafe { str_arg(proxy) } {
            Some(p) => {
                req.inner.proxy = (!p.is_empty()).then(|| p.to_string());
                true
            }
            None => false,
        }
    })
}

/// Connect timeout in seconds.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_timeout_secs(request: *mut NqRequest, secs: u64) -> bool {
    with_request(request, |req| {
        req.inner.timeout = Duration::from_secs(secs);
        true
    })
}

/// Copy `len` bytes from `data` into the request body. A null `data` with
/// zero `len` clears the body.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_body(request: *mut NqRequest, data: *const u8, len: usize) -> bool {
    with_request(request, |req| {
        if data.is_null() {
            if len != 0 {
                return false;
            }
            req.inner.body.clear();
            return true;
        }
        req.inner.body = unsafe { std::slice::from_raw_parts(data, len) }.to_vec();
        true
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_tag(request: *mut NqRequest, tag: *const c_char) -> bool {
    with_request(request, |req| match unsafe { str_arg(tag) } {
        Some(tag) => {
            req.inner.tag = tag.to_string();
            true
        }
        None => false,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_flag(request: *mut NqRequest, flag: i32) -> bool {
    with_request(request, |req| {
        req.inner.flag = flag;
        true
    })
}

/// Append one `"Name: value"` header line. The line is validated when the
/// request runs; a malformed line fails the response with a setup error.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_add_header(request: *mut NqRequest, line: *const c_char) -> bool {
    with_request(request, |req| match unsafe { str_arg(line) } {
        Some(line) => {
            req.inner.add_header(line);
            true
        }
        None => false,
    })
}

/// Register `callback` to run from `nq_visit` with this request's response.
/// A null callback clears any previous one. `user_data` is passed through
/// untouched and must stay valid until the callback has run.
#[unsafe(no_mangle)]
pub extern "C" fn nq_request_set_callback(
    request: *mut NqRequest,
    callback: NqCallback,
    user_data: *mut c_void,
) -> bool {
    with_request(request, |req| {
        match callback {
            Some(cb) => {
                let data = UserData::new(user_data);
                req.inner.set_callback(Some(Box::new(move |resp: &Response| {
                    cb(NqResponse::borrowed(resp), data.get());
                })));
            }
            None => req.inner.set_callback(None),
        }
        true
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Queue `request` for the worker. The request handle is consumed even when
/// an error is returned.
#[unsafe(no_mangle)]
pub extern "C" fn nq_send(manager: *const NqManager, request: *mut NqRequest) -> NqStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if request.is_null() {
            return NqStatus::NullArg;
        }
        let request = unsafe { Box::from_raw(request) };
        if manager.is_null() {
            return NqStatus::NullArg;
        }
        let manager = unsafe { &*manager };
        match manager.inner.send(request.inner) {
            Ok(()) => NqStatus::Ok,
            Err(e) => NqStatus::from(&e),
        }
    }))
    .unwrap_or(NqStatus::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_has_response(manager: *const NqManager) -> bool {
    if manager.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*manager }.inner.has_response())).unwrap_or(false)
}

/// Pop the oldest completed response, or null if none is ready. Free the
/// result with `nq_response_free`. Any registered callback is not run.
#[unsafe(no_mangle)]
pub extern "C" fn nq_get_response(manager: *const NqManager) -> *mut NqResponse {
    if manager.is_null() {
        return std::ptr::null_mut();
    }
    catch_unwind(AssertUnwindSafe(|| {
        match unsafe { &*manager }.inner.get_response() {
            Some(resp) => NqResponse::into_raw(resp),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Pop the oldest completed response and run its callback, if any, on this
/// thread. The response is freed afterwards. Returns false when no response
/// was ready.
#[unsafe(no_mangle)]
pub extern "C" fn nq_visit(manager: *const NqManager) -> bool {
    if manager.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*manager }.inner.visit())).unwrap_or_else(|_| {
        error!("panic in nq_visit");
        false
    })
}

// ---------------------------------------------------------------------------
// Response accessors
// ---------------------------------------------------------------------------

/// Whether the exchange completed with an accepted status.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_success(response: *const NqResponse) -> bool {
    if response.is_null() {
        return false;
    }
    catch_unwind(|| unsafe { NqResponse::as_core(response) }.success()).unwrap_or(false)
}

/// Raw HTTP status; 0 when no status line was received.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_status(response: *const NqResponse) -> u16 {
    if response.is_null() {
        return 0;
    }
    catch_unwind(|| unsafe { NqResponse::as_core(response) }.status()).unwrap_or(0)
}

/// Borrow the response body. The pointer stays valid until the response is
/// freed, or until the callback returns for a borrowed response. Writes the
/// length to `out_len` when it is non-null.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_body(response: *const NqResponse, out_len: *mut usize) -> *const u8 {
    if response.is_null() {
        if !out_len.is_null() {
            unsafe { *out_len = 0 };
        }
        return std::ptr::null();
    }
    catch_unwind(|| {
        let body = unsafe { NqResponse::as_core(response) }.body();
        if !out_len.is_null() {
            unsafe { *out_len = body.len() };
        }
        body.as_ptr()
    })
    .unwrap_or(std::ptr::null())
}

/// Copy of the request tag. Free with `nq_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_tag(response: *const NqResponse) -> *mut c_char {
    if response.is_null() {
        return std::ptr::null_mut();
    }
    catch_unwind(AssertUnwindSafe(|| {
        owned_c_string(unsafe { NqResponse::as_core(response) }.tag())
    }))
    .unwrap_or(std::ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_response_flag(response: *const NqResponse) -> i32 {
    if response.is_null() {
        return 0;
    }
    catch_unwind(|| unsafe { NqResponse::as_core(response) }.flag()).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nq_response_error_kind(response: *const NqResponse) -> NqErrorKind {
    if response.is_null() {
        return NqErrorKind::None;
    }
    catch_unwind(|| {
        unsafe { NqResponse::as_core(response) }
            .error()
            .map_or(NqErrorKind::None, |e| e.kind.into())
    })
    .unwrap_or(NqErrorKind::Other)
}

/// Human-readable transport error, or null when there is none. Free with
/// `nq_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_error_message(response: *const NqResponse) -> *mut c_char {
    if response.is_null() {
        return std::ptr::null_mut();
    }
    catch_unwind(AssertUnwindSafe(|| {
        match unsafe { NqResponse::as_core(response) }.error() {
            Some(e) => owned_c_string(&e.to_string()),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a response from `nq_get_response`. Safe to call with null. Never
/// call this on the pointer handed to a callback.
#[unsafe(no_mangle)]
pub extern "C" fn nq_response_free(response: *mut NqResponse) {
    if !response.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { NqResponse::from_raw(response) });
        }));
    }
}

/// Free a string returned by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nq_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

//! Error types for the dispatch engine.
//!
//! # Design
//! Two families live here. `EngineError` and `ConfigError` are ordinary
//! `Result` errors for programmer mistakes (double init, shutdown from the
//! worker thread) and bad configuration. `TransportError` is different: it
//! never crosses the queue boundary as an `Err`. The executor stores it on
//! the `Response` so the caller sees every failure through the normal
//! response path, with a `TransportErrorKind` for diagnosis.

use std::fmt;
use std::io;

use thiserror::Error;

/// Errors returned by `DispatchEngine` and `NetworkManager` lifecycle calls.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `init()` was called on an engine whose worker is already running.
    #[error("dispatch engine is already initialized")]
    AlreadyInitialized,

    /// An operation needing the worker was called before `init()`.
    #[error("dispatch engine has not been initialized")]
    NotInitialized,

    /// The engine has been shut down and no longer accepts requests.
    #[error("dispatch engine has been shut down")]
    Stopped,

    /// A blocking shutdown was requested from the worker thread itself.
    #[error("blocking shutdown called from the dispatch worker thread")]
    ShutdownFromWorker,

    /// The engine was built from a config that fails validation.
    #[error("invalid engine config: {0}")]
    Config(#[from] ConfigError),

    /// The worker thread could not be spawned.
    #[error("failed to spawn dispatch worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors raised while loading an `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Coarse category of a failed transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The call could not be prepared: bad URL, malformed header, bad proxy.
    Setup,
    /// Host name resolution failed.
    Dns,
    /// The TCP/TLS connection could not be established.
    Connect,
    /// Connect or overall timeout elapsed.
    Timeout,
    /// Reading or writing the connection failed mid-exchange.
    Io,
    /// The transport panicked; the request was not completed.
    Panic,
    /// Anything the transport could not classify.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Setup => "setup",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Panic => "panic",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A transport-level failure recorded on a `Response`.
///
/// `status` is the HTTP status when one was received before the failure
/// (e.g. the body stream broke), otherwise 0.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub status: u16,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: 0,
            message: message.into(),
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Setup, message)
    }

    pub fn io(err: io::Error) -> Self {
        let kind = if err.kind() == io::ErrorKind::TimedOut {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Io
        };
        Self::new(kind, err.to_string())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        let kind = match &err {
            ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
            ureq::Error::HostNotFound => TransportErrorKind::Dns,
            ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
            ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            ureq::Error::Io(_) => TransportErrorKind::Io,
            ureq::Error::BadUri(_) | ureq::Error::Http(_) => TransportErrorKind::Setup,
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string())
    }
}

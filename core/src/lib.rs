//! Non-blocking HTTP dispatch for callers that own a frame loop.
//!
//! # Overview
//! Callers build `Request` values and `send` them; one background worker
//! performs the blocking network calls in FIFO order and queues a
//! `Response` for each. The caller drains responses on its own schedule,
//! either by polling `get_response` or by calling `visit` once per frame.
//!
//! # Design
//! - `SyncQueue` is the only shared container; its operations are atomic so
//!   no caller ever brackets a lock by hand.
//! - `DispatchEngine` owns both queues and the worker thread, and shuts down
//!   through a single wait-with-timeout path (join when it exits in time,
//!   detach otherwise).
//! - `RequestExecutor` folds every failure into the `Response`, so nothing
//!   but responses ever crosses the queue boundary.
//! - `Transport` is the seam to the HTTP client; `UreqTransport` is the
//!   default.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod http;
pub mod manager;
pub mod queue;
pub mod shared;
pub mod signal;
pub mod transport;

pub use config::{EngineConfig, SuccessPolicy, TransportConfig};
pub use engine::{DispatchEngine, EngineState, ShutdownReport};
pub use error::{ConfigError, EngineError, TransportError, TransportErrorKind};
pub use executor::RequestExecutor;
pub use http::{HttpMethod, Request, Response, ResponseCallback};
pub use manager::NetworkManager;
pub use queue::{Pop, SyncQueue};
pub use shared::{init_shared_state, release_state, shared_state};
pub use signal::{CloseSignal, ShutdownFlag};
pub use transport::{Transport, TransportCall, UreqTransport};

//! Main-loop facade over one `DispatchEngine`.
//!
//! # Design
//! `NetworkManager` is what a render loop talks to. Building one starts the
//! worker, so an uninitialized engine is never observable. `visit` is the
//! per-frame hook: it consumes at most one response, so a backlog of
//! completed requests never turns into a single long frame.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{DispatchEngine, EngineState, ShutdownReport};
use crate::error::EngineError;
use crate::http::{Request, Response};
use crate::transport::Transport;

#[derive(Debug)]
pub struct NetworkManager {
    engine: DispatchEngine,
}

impl NetworkManager {
    /// Create the engine with the `ureq` transport and start its worker.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::from_engine(DispatchEngine::new(config))
    }

    pub fn with_transport(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, EngineError> {
        Self::from_engine(DispatchEngine::with_transport(config, transport))
    }

    fn from_engine(engine: DispatchEngine) -> Result<Self, EngineError> {
        engine.init()?;
        Ok(Self { engine })
    }

    /// A fresh GET request for the caller to configure before `send`.
    pub fn new_request(&self) -> Request {
        Request::new()
    }

    pub fn send(&self, request: Request) -> Result<(), EngineError> {
        self.engine.submit(request)
    }

    pub fn has_response(&self) -> bool {
        self.engine.has_response()
    }

    /// The oldest completed response, or `None` if nothing is ready.
    pub fn get_response(&self) -> Option<Response> {
        self.engine.try_recv()
    }

    pub fn pending_responses(&self) -> usize {
        self.engine.pending_responses()
    }

    /// Consume at most one response: run its callback, then drop it.
    ///
    /// Returns whether a response was processed.
    pub fn visit(&self) -> bool {
        let Some(mut response) = self.engine.try_recv() else {
            return false;
        };
        if let Some(callback) = response.take_callback() {
            callback(&response);
        }
        true
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn shutdown(&self, force: bool) -> Result<ShutdownReport, EngineError> {
        self.engine.shutdown(force)
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }
}

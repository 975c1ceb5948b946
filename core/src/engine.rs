//! Request/response queue engine with a single background worker.
//!
//! # Design
//! The engine and its worker share one `Shared` block through an `Arc`:
//! the request queue, the response queue, the shutdown flag, the close
//! signal and the lifecycle state. The worker is a named OS thread that
//! loops over:
//!
//! 1. check the shutdown flag, exit if set;
//! 2. `pop_wait` on the request queue (woken by `submit` or by the queue
//!    being closed, bounded by `idle_wait`);
//! 3. execute the request, then deliver the response.
//!
//! Shutdown is one operation, `shutdown_timeout`: set the flag, close the
//! request queue, wait for the worker's close signal for up to the given
//! time, mark the engine stopped, then drain both queues. `shutdown(false)`
//! waits without a bound; `shutdown(true)` does not wait at all and leaves
//! the worker to finish its current call on its own.
//!
//! Delivery checks the lifecycle state under the state lock, and shutdown
//! sets `Stopped` under the same lock before draining. A response finished
//! after shutdown is therefore dropped by the worker instead of appearing
//! in a queue the caller believes is empty.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, TransportError, TransportErrorKind};
use crate::executor::RequestExecutor;
use crate::http::{Request, Response};
use crate::queue::{Pop, SyncQueue};
use crate::signal::{CloseSignal, ShutdownFlag};
use crate::transport::{Transport, UreqTransport};

const WORKER_NAME: &str = "netqueue-worker";

/// Lifecycle of a `DispatchEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, worker not started.
    Idle,
    Running,
    /// Close requested; the worker exits at its next check.
    StopRequested,
    /// Shut down and drained. Terminal.
    Stopped,
}

impl EngineState {
    fn accepts_requests(self) -> bool {
        matches!(self, EngineState::Running | EngineState::StopRequested)
    }
}

/// What a shutdown left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The worker acknowledged the close and was joined.
    pub joined: bool,
    /// Requests still queued and dropped without executing.
    pub discarded_requests: usize,
    /// Completed responses the caller never collected.
    pub discarded_responses: usize,
}

struct Shared {
    requests: SyncQueue<Request>,
    responses: SyncQueue<Response>,
    shutdown: ShutdownFlag,
    closed: CloseSignal,
    state: Mutex<EngineState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, response: Response) {
        let state = self.state();
        if *state == EngineState::Stopped {
            debug!(
                request_id = %response.request().id(),
                tag = %response.tag(),
                "engine stopped, discarding late response"
            );
            return;
        }
        self.responses.push(response);
    }
}

/// Broadcasts the close signal when the worker leaves, even by unwinding.
struct ExitGuard<'a>(&'a CloseSignal);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.broadcast();
    }
}

/// Owns the request and response queues and the worker that connects them.
pub struct DispatchEngine {
    shared: Arc<Shared>,
    executor: RequestExecutor,
    idle_wait: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Mutex<Option<ThreadId>>,
}

impl DispatchEngine {
    /// Engine using the `ureq` transport.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                requests: SyncQueue::new(),
                responses: SyncQueue::new(),
                shutdown: ShutdownFlag::new(),
                closed: CloseSignal::new(),
                state: Mutex::new(EngineState::Idle),
            }),
            executor: RequestExecutor::new(transport, config.transport),
            idle_wait: config.idle_wait,
            worker: Mutex::new(None),
            worker_id: Mutex::new(None),
        }
    }

    /// Start the worker thread. Must be called exactly once.
    ///
    /// Fails with `EngineError::Config` if the engine was built from a config
    /// that does not validate; no worker is started then.
    pub fn init(&self) -> Result<(), EngineError> {
        let mut state = self.shared.state();
        if *state != EngineState::Idle {
            return Err(EngineError::AlreadyInitialized);
        }
        EngineConfig {
            idle_wait: self.idle_wait,
            transport: self.executor.config().clone(),
        }
        .validate()?;

        let shared = Arc::clone(&self.shared);
        let executor = self.executor.clone();
        let idle_wait = self.idle_wait;
        let handle = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run_worker(&shared, &executor, idle_wait))
            .map_err(EngineError::Spawn)?;

        *self.worker_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.thread().id());
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        *state = EngineState::Running;
        Ok(())
    }

    /// Queue `request` for the worker.
    ///
    /// Accepted until shutdown completes. A request submitted after
    /// `request_close` is queued but will be discarded by the drain.
    pub fn submit(&self, request: Request) -> Result<(), EngineError> {
        // Held across the push so a concurrent shutdown cannot drain first.
        let state = self.shared.state();
        if !state.accepts_requests() {
            return Err(match *state {
                EngineState::Idle => EngineError::NotInitialized,
                _ => EngineError::Stopped,
            });
        }
        debug!(
            request_id = %request.id(),
            tag = %request.tag,
            method = %request.method,
            url = %request.url,
            "request queued"
        );
        self.shared.requests.push(request);
        Ok(())
    }

    /// True when at least one response is ready.
    pub fn has_response(&self) -> bool {
        !self.shared.responses.is_empty()
    }

    /// Remove the oldest ready response, if any.
    pub fn try_recv(&self) -> Option<Response> {
        self.shared.responses.try_pop()
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.requests.len()
    }

    pub fn pending_responses(&self) -> usize {
        self.shared.responses.len()
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state()
    }

    /// Whether the worker is (or may still be) running.
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), EngineState::Running | EngineState::StopRequested)
    }

    /// Ask the worker to stop at its next check. Idempotent.
    pub fn request_close(&self) {
        {
            let mut state = self.shared.state();
            if *state == EngineState::Running {
                *state = EngineState::StopRequested;
            }
        }
        self.shared.shutdown.request();
        self.shared.requests.close();
    }

    pub fn should_close(&self) -> bool {
        self.shared.shutdown.is_set()
    }

    /// Stop the worker and drain both queues.
    ///
    /// With `force` the call does not wait for the worker; any request it is
    /// executing completes in the background and its response is dropped.
    /// Without `force` this blocks until the worker has left its loop, which
    /// can take as long as the request currently in flight.
    pub fn shutdown(&self, force: bool) -> Result<ShutdownReport, EngineError> {
        let timeout = if force { Some(Duration::ZERO) } else { None };
        self.shutdown_timeout(timeout)
    }

    /// Stop the worker, waiting at most `timeout` (`None` = no bound) for it
    /// to exit before draining. The worker is joined if it exited in time
    /// and detached otherwise.
    pub fn shutdown_timeout(&self, timeout: Option<Duration>) -> Result<ShutdownReport, EngineError> {
        match self.state() {
            EngineState::Idle => return Err(EngineError::NotInitialized),
            EngineState::Stopped => return Ok(ShutdownReport::default()),
            EngineState::Running | EngineState::StopRequested => {}
        }

        let waits = timeout != Some(Duration::ZERO);
        if waits && self.on_worker_thread() {
            return Err(EngineError::ShutdownFromWorker);
        }

        self.request_close();
        let exited = self.shared.closed.wait(timeout);

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let joined = match worker {
            Some(handle) if exited && !self.on_worker_thread() => handle.join().is_ok(),
            Some(_) => {
                warn!(
                    in_flight = !exited,
                    "dispatch worker not joined, leaving it detached"
                );
                false
            }
            None => exited,
        };

        *self.shared.state() = EngineState::Stopped;

        let discarded_requests = self.shared.requests.drain().len();
        let discarded_responses = self.shared.responses.drain().len();
        if discarded_requests > 0 || discarded_responses > 0 {
            warn!(
                discarded_requests,
                discarded_responses, "discarded queued work on shutdown"
            );
        }
        info!(joined, "dispatch engine stopped");

        Ok(ShutdownReport {
            joined,
            discarded_requests,
            discarded_responses,
        })
    }

    fn on_worker_thread(&self) -> bool {
        let worker_id = *self.worker_id.lock().unwrap_or_else(PoisonError::into_inner);
        worker_id == Some(thread::current().id())
    }
}

impl Drop for DispatchEngine {
    fn drop(&mut self) {
        if !self.is_alive() {
            return;
        }
        let idle = self.shared.requests.is_empty() && self.shared.responses.is_empty();
        let force = idle || self.on_worker_thread();
        if let Err(e) = self.shutdown(force) {
            warn!(error = %e, "shutdown on drop failed");
        }
    }
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("state", &self.state())
            .field("pending_requests", &self.pending_requests())
            .field("pending_responses", &self.pending_responses())
            .finish()
    }
}

fn run_worker(shared: &Shared, executor: &RequestExecutor, idle_wait: Duration) {
    let _exit = ExitGuard(&shared.closed);
    info!("dispatch worker started");

    loop {
        if shared.shutdown.is_set() {
            break;
        }
        let request = match shared.requests.pop_wait(idle_wait) {
            Pop::Item(request) => request,
            Pop::Empty => continue,
            Pop::Closed => break,
        };

        let request_id = request.id();
        debug!(
            %request_id,
            tag = %request.tag,
            method = %request.method,
            url = %request.url,
            "executing request"
        );
        let mut response = Response::new(request);
        // Transport panics are absorbed by the executor; this covers the
        // executor itself so the request still yields a response.
        if catch_unwind(AssertUnwindSafe(|| executor.execute_into(&mut response))).is_err() {
            warn!(%request_id, "request executor panicked");
            response.fail(TransportError::new(
                TransportErrorKind::Panic,
                "executor panicked while executing the request",
            ));
        }
        debug!(
            %request_id,
            status = response.status(),
            success = response.success(),
            bytes = response.body().len(),
            "request finished"
        );
        shared.deliver(response);
    }

    info!("dispatch worker exiting");
}

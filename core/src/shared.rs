//! Process-wide `NetworkManager` holder.
//!
//! For hosts that cannot thread a manager through their code. The holder is
//! empty until `init_shared_state` or the first `shared_state` call, and is
//! emptied again only by `release_state`. Handles already given out keep
//! the manager alive; its engine shuts down when the last one is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::manager::NetworkManager;

static SHARED: Mutex<Option<Arc<NetworkManager>>> = Mutex::new(None);

/// Install a manager built from `config`.
///
/// Fails with `AlreadyInitialized` if one is already installed.
pub fn init_shared_state(config: EngineConfig) -> Result<Arc<NetworkManager>, EngineError> {
    let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(EngineError::AlreadyInitialized);
    }
    let manager = Arc::new(NetworkManager::new(config)?);
    *slot = Some(Arc::clone(&manager));
    info!("shared network manager installed");
    Ok(manager)
}

/// The installed manager, creating one with the default config if empty.
pub fn shared_state() -> Result<Arc<NetworkManager>, EngineError> {
    let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(manager) = slot.as_ref() {
        return Ok(Arc::clone(manager));
    }
    let manager = Arc::new(NetworkManager::new(EngineConfig::default())?);
    *slot = Some(Arc::clone(&manager));
    info!("shared network manager created");
    Ok(manager)
}

/// Remove the installed manager. Returns whether there was one.
pub fn release_state() -> bool {
    let released = SHARED.lock().unwrap_or_else(PoisonError::into_inner).take();
    // Dropped outside the lock: the engine may wait for its worker.
    let had_manager = released.is_some();
    drop(released);
    if had_manager {
        info!("shared network manager released");
    }
    had_manager
}

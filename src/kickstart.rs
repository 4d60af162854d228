//! The kickstart registry (`function_map`): functions invoked once, at
//! driver start, signalling "the schedule is now active".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Backtest,
    Live,
}

#[derive(Clone)]
pub struct KickstartEntry {
    pub func: Arc<dyn Fn() + Send + Sync>,
    pub backtest: bool,
    pub live: bool,
}

/// Write-once-per-name registry of kickstart functions. Grounded on the
/// teacher's pattern of a single shared map guarded by a lock, mutated only
/// at registration and read only at driver start.
#[derive(Clone, Default)]
pub struct KickstartRegistry {
    inner: Arc<RwLock<HashMap<String, KickstartEntry>>>,
}

impl KickstartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: String, entry: KickstartEntry) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().expect("kickstart lock poisoned");
        if inner.contains_key(&name) {
            return Err(RegistryError::DuplicateJobName(name));
        }
        inner.insert(name, entry);
        Ok(())
    }

    /// Invokes every registered function whose flag for `phase` is set,
    /// exactly once, in registration order is not guaranteed (a `HashMap`
    /// iteration), matching the "each kickstart is independent" contract.
    pub fn call_all(&self, phase: Phase) {
        let inner = self.inner.read().expect("kickstart lock poisoned");
        for entry in inner.values() {
            let should_call = match phase {
                Phase::Backtest => entry.backtest,
                Phase::Live => entry.live,
            };
            if should_call {
                (entry.func)();
            }
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Single-flight cache of instantiated modules keyed by resolved path.
///
/// Concurrent callers asking for the same path share one instantiation;
/// late callers block until it finishes. A failed instantiation leaves the
/// slot empty so a later call retries.
pub struct ModuleCache<V> {
    slots: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V> Default for ModuleCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ModuleCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for `path`, running `instantiate` at most once
    /// per successful instantiation.
    ///
    /// `instantiate` must not request the same path again.
    pub fn get_or_instantiate<E>(
        &self,
        path: &str,
        instantiate: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let slot = self
            .slots
            .lock()
            .entry(path.to_string())
            .or_default()
            .clone();
        slot.get_or_try_init(instantiate).cloned()
    }

    pub fn get(&self, path: &str) -> Option<V> {
        let slot = self.slots.lock().get(path).cloned()?;
        slot.get().cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.slots
            .lock()
            .get(path)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Paths with a completed instance.
    pub fn paths(&self) -> Vec<String> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

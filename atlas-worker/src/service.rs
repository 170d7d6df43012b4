use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// Long-running services started by task handlers, keyed by job id so the
/// scheduler can route `STOP|<id>` back to this worker.
#[derive(Default)]
pub struct ServiceTable {
    services: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, handle: JoinHandle<()>) {
        let id = id.into();
        info!(service = %id, "service registered");
        self.services.lock().unwrap().insert(id, handle);
    }

    /// Stops and forgets the service. Returns false for unknown ids.
    pub fn stop(&self, id: &str) -> bool {
        match self.services.lock().unwrap().remove(id) {
            Some(handle) => {
                handle.abort();
                info!(service = %id, "service stopped");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.services.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.lock().unwrap().is_empty()
    }
}

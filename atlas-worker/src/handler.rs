use async_trait::async_trait;
use atlas_traits::TaskHandler;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, RwLock};

/// Capability-keyed lookup table mapping a skill name to its handler. New
/// skills register here without touching the RPC dispatch path.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, skill: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.write().unwrap().insert(skill.into(), handler);
    }

    pub fn get(&self, skill: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().unwrap().get(skill).cloned()
    }

    pub fn skills(&self) -> Vec<String> {
        self.handlers.read().unwrap().keys().cloned().collect()
    }
}

/// Default handler: acknowledges the payload back to the caller. Stands in
/// for real execution backends, which plug in behind `TaskHandler`.
pub struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    async fn execute(&self, payload: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(format!("COMPLETED|0|{payload}"))
    }
}

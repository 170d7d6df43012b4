use async_trait::async_trait;
use std::error::Error;

/// Start/stop lifecycle for long-lived components (scheduler, worker node),
/// so instances are owned and injectable rather than process-wide singletons.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn stop(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn is_running(&self) -> bool;
}

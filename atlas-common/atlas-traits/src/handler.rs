use async_trait::async_trait;
use std::error::Error;

/// The entire contract a pluggable task backend must satisfy: given the data
/// part of an `EXECUTE <skill>|<data>` payload, produce a textual result or
/// fail. New skills register a handler into the worker's table without
/// touching dispatch logic.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, payload: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

use async_trait::async_trait;
use std::error::Error;

/// Persistence boundary for job state. The concrete store is an external
/// key/value service; the scheduler core only needs these five operations.
#[async_trait]
pub trait JobStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>>;
    async fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn sadd(&self, set: &str, member: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn srem(&self, set: &str, member: &str) -> Result<bool, Box<dyn Error + Send + Sync>>;
    async fn smembers(&self, set: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>>;
}

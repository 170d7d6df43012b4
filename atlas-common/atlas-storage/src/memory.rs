use async_trait::async_trait;
use atlas_traits::JobStore;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::RwLock;

/// In-memory `JobStore`. The default backing store for tests and single
/// process deployments; a networked key/value service slots in behind the
/// same trait.
#[derive(Default)]
pub struct MemoryStore {
    keys: RwLock<HashMap<String, String>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        Ok(self.keys.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.keys
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn sadd(&self, set: &str, member: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sets
            .write()
            .unwrap()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, set: &str, member: &str) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self
            .sets
            .write()
            .unwrap()
            .get_mut(set)
            .map(|s| s.remove(member))
            .unwrap_or(false))
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        Ok(self
            .sets
            .read()
            .unwrap()
            .get(set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }
}

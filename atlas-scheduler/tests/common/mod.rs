//! Shared harness for scheduler integration tests: a scheduler with fast
//! backoffs on an ephemeral port, real worker nodes, and recording handlers.

use async_trait::async_trait;
use atlas_scheduler::{Scheduler, SchedulerConfig};
use atlas_traits::{JobStore, Lifecycle, TaskHandler};
use atlas_worker::{WorkerConfig, WorkerNode};
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        port: 0,
        staging_dir: PathBuf::from("staging"),
        heartbeat_initial_secs: 1,
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 1,
        execute_timeout_secs: 5,
        max_retries: 3,
        max_worker_capacity: 4,
        idle_backoff_ms: 20,
        no_worker_backoff_ms: 50,
        saturated_backoff_ms: 20,
    }
}

pub async fn start_scheduler(config: SchedulerConfig, store: Arc<dyn JobStore>) -> (Scheduler, SocketAddr) {
    let mut scheduler = Scheduler::new(config, store);
    scheduler.start().await.expect("scheduler should start");
    let addr = scheduler.local_addr().expect("bound address");
    (scheduler, addr)
}

pub async fn start_worker(scheduler: SocketAddr, capabilities: &[&str]) -> WorkerNode {
    let mut node = WorkerNode::new(WorkerConfig {
        port: 0,
        scheduler_host: "127.0.0.1".to_string(),
        scheduler_port: scheduler.port(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
    });
    node.start().await.expect("worker should start");
    node
}

/// Appends every executed payload to a shared log, tagged with a worker name.
pub struct RecordingHandler {
    pub tag: String,
    pub log: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn execute(&self, payload: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.log
            .lock()
            .unwrap()
            .push((self.tag.clone(), payload.to_string()));
        Ok(format!("COMPLETED|0|{payload}"))
    }
}

/// Always fails; drives the retry/dead-letter path.
pub struct FailingHandler;

#[async_trait]
impl TaskHandler for FailingHandler {
    async fn execute(&self, _payload: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        Err("simulated handler failure".into())
    }
}

/// Polls `predicate` until it holds or the timeout elapses.
pub async fn wait_for<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    predicate()
}

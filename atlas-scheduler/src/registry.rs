use atlas_types::WorkerAddr;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{info, warn};

/// A registered execution endpoint as the scheduler sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Worker {
    pub addr: WorkerAddr,
    pub capabilities: HashSet<String>,
    pub last_seen: DateTime<Utc>,
    pub current_load: u32,
    pub max_capacity: u32,
    pub alive: bool,
}

impl Worker {
    pub fn is_saturated(&self) -> bool {
        self.current_load >= self.max_capacity
    }

    pub fn has_capability(&self, skill: &str) -> bool {
        self.capabilities.contains(skill)
    }
}

/// Tracks known workers, their capabilities, load and liveness. All mutation
/// goes through one coarse lock; reads hand out snapshots so dispatch never
/// iterates registry internals.
pub struct WorkerRegistry {
    workers: Mutex<HashMap<WorkerAddr, Worker>>,
    max_capacity: u32,
}

impl WorkerRegistry {
    pub fn new(max_capacity: u32) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            max_capacity,
        }
    }

    /// Worker-initiated registration. Re-registering refreshes capabilities
    /// and revives a previously dead entry.
    pub fn add_worker(&self, host: &str, port: u16, capabilities: HashSet<String>) {
        let addr = WorkerAddr::new(host, port);
        info!(worker = %addr, ?capabilities, "registering worker");
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(&addr) {
            Some(existing) => {
                existing.capabilities = capabilities;
                existing.last_seen = Utc::now();
                existing.alive = true;
            }
            None => {
                workers.insert(
                    addr.clone(),
                    Worker {
                        addr,
                        capabilities,
                        last_seen: Utc::now(),
                        current_load: 0,
                        max_capacity: self.max_capacity,
                        alive: true,
                    },
                );
            }
        }
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.workers.lock().unwrap().values().cloned().collect()
    }

    /// Alive workers advertising the given skill.
    pub fn workers_by_capability(&self, skill: &str) -> Vec<Worker> {
        self.workers
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.alive && w.has_capability(skill))
            .cloned()
            .collect()
    }

    /// Removes a worker from the selection pool without deleting its
    /// registration record.
    pub fn mark_dead(&self, addr: &WorkerAddr) {
        let mut workers = self.workers.lock().unwrap();
        if let Some(worker) = workers.get_mut(addr) {
            if worker.alive {
                warn!(worker = %addr, "marking worker dead");
            }
            worker.alive = false;
        }
    }

    /// Heartbeat result: refresh `last_seen`, revive, and apply the reported
    /// load when the worker announced one.
    pub fn update_liveness(&self, addr: &WorkerAddr, load: Option<u32>) {
        let mut workers = self.workers.lock().unwrap();
        if let Some(worker) = workers.get_mut(addr) {
            worker.last_seen = Utc::now();
            worker.alive = true;
            if let Some(load) = load {
                worker.current_load = load;
            }
        }
    }

    /// Optimistic bump when a job is dispatched; the next heartbeat report
    /// overwrites it with the worker's own figure.
    pub fn bump_load(&self, addr: &WorkerAddr) {
        let mut workers = self.workers.lock().unwrap();
        if let Some(worker) = workers.get_mut(addr) {
            worker.current_load = worker.current_load.saturating_add(1);
        }
    }

    pub fn len(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().unwrap().is_empty()
    }
}

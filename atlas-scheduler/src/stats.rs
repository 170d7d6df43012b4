use crate::registry::Worker;
use atlas_types::JobId;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Default, Clone, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEntry {
    pub id: JobId,
    pub worker: String,
}

/// Snapshot answered to `STATS` / `STATS_JSON`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub workers: Vec<Worker>,
    pub jobs: JobCounts,
    pub ready_depth: usize,
    pub waiting_depth: usize,
    pub blocked: usize,
    pub dead_letter: Vec<JobId>,
    pub services: Vec<ServiceEntry>,
}

impl SystemStats {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("ERROR: stats encoding: {e}"))
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== WORKERS ({}) ===", self.workers.len());
        for w in &self.workers {
            let mut caps: Vec<&str> = w.capabilities.iter().map(String::as_str).collect();
            caps.sort_unstable();
            let _ = writeln!(
                out,
                "{} [{}] load={}/{} {}",
                w.addr,
                caps.join(","),
                w.current_load,
                w.max_capacity,
                if w.alive { "ALIVE" } else { "DEAD" }
            );
        }
        let _ = writeln!(
            out,
            "=== JOBS === pending={} running={} completed={} failed={} dead={}",
            self.jobs.pending, self.jobs.running, self.jobs.completed, self.jobs.failed,
            self.jobs.dead
        );
        let _ = writeln!(
            out,
            "queues: ready={} waiting={} blocked={}",
            self.ready_depth, self.waiting_depth, self.blocked
        );
        if !self.dead_letter.is_empty() {
            let _ = writeln!(out, "dead-letter: {}", self.dead_letter.join(", "));
        }
        for svc in &self.services {
            let _ = writeln!(out, "service {} @ {}", svc.id, svc.worker);
        }
        out
    }
}

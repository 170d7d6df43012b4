//! The core scheduling loop: one job is fully placed (or deferred) before the
//! next is considered, so two placements can never race on a worker's load.

use crate::core::SchedulerCore;
use crate::registry::Worker;
use crate::staging::DEPLOY_PAYLOAD_SKILL;
use atlas_types::{Job, JobStatus};
use std::time::Duration;
use tracing::{error, info, warn};

impl SchedulerCore {
    pub async fn dispatch_loop(&self) {
        info!("dispatch loop running");
        loop {
            let Some(job) = self.ready.pop() else {
                tokio::time::sleep(Duration::from_millis(self.config.idle_backoff_ms)).await;
                continue;
            };
            self.dispatch_one(job).await;
        }
    }

    async fn dispatch_one(&self, mut job: Job) {
        job.status = JobStatus::Running;
        self.set_status(&job.id, JobStatus::Running);
        self.persist_status(&job.id, JobStatus::Running).await;

        let skill = job.skill().to_string();
        let candidates = self.registry.workers_by_capability(&skill);
        if candidates.is_empty() {
            warn!(job = %job.id, %skill, "no capable workers, re-queueing");
            self.requeue_pending(job).await;
            tokio::time::sleep(Duration::from_millis(self.config.no_worker_backoff_ms)).await;
            return;
        }

        let Some(worker) = self.select_worker(&candidates, &job) else {
            warn!(job = %job.id, %skill, "all capable workers saturated, re-queueing");
            self.requeue_pending(job).await;
            tokio::time::sleep(Duration::from_millis(self.config.saturated_backoff_ms)).await;
            return;
        };

        info!(job = %job.id, worker = %worker.addr, %skill, "dispatching");
        job.bound_worker = Some(worker.addr.clone());
        self.bindings
            .lock()
            .unwrap()
            .insert(job.id.clone(), worker.addr.clone());
        self.registry.bump_load(&worker.addr);

        let request = format!("EXECUTE {}", job.payload);
        let response = self
            .client
            .request_timeout(
                &worker.addr.host,
                worker.addr.port,
                &request,
                Duration::from_secs(self.config.execute_timeout_secs),
            )
            .await;

        match response {
            Ok(r) if !r.starts_with("ERROR") && !r.starts_with("JOB_FAILED") => {
                self.complete_job(job, &worker, &r).await;
            }
            Ok(r) => {
                error!(job = %job.id, worker = %worker.addr, response = %r, "worker reported failure");
                self.handle_failure(job).await;
            }
            Err(e) => {
                error!(job = %job.id, worker = %worker.addr, error = %e, "execute rpc failed");
                self.handle_failure(job).await;
            }
        }
    }

    /// Placement policy: an affinity job prefers the worker bound to its
    /// first dependency when that worker is present, capable and unsaturated;
    /// otherwise the least-loaded unsaturated candidate wins (linear scan,
    /// first minimum).
    pub fn select_worker(&self, candidates: &[Worker], job: &Job) -> Option<Worker> {
        if job.affinity {
            if let Some(first_dep) = job.dependencies.first() {
                let bound = self.bindings.lock().unwrap().get(first_dep).cloned();
                if let Some(addr) = bound {
                    if let Some(w) = candidates.iter().find(|w| w.addr == addr) {
                        if !w.is_saturated() {
                            info!(job = %job.id, worker = %w.addr, "affinity placement");
                            return Some(w.clone());
                        }
                    }
                }
            }
        }

        let mut best: Option<&Worker> = None;
        let mut min_load = u32::MAX;
        for worker in candidates {
            if worker.is_saturated() {
                continue;
            }
            if worker.current_load < min_load {
                min_load = worker.current_load;
                best = Some(worker);
            }
        }
        best.cloned()
    }

    async fn requeue_pending(&self, mut job: Job) {
        job.status = JobStatus::Pending;
        self.set_status(&job.id, JobStatus::Pending);
        self.persist_status(&job.id, JobStatus::Pending).await;
        self.ready.push(job);
    }

    async fn complete_job(&self, mut job: Job, worker: &Worker, response: &str) {
        info!(job = %job.id, worker = %worker.addr, response = %response, "job completed");
        job.status = JobStatus::Completed;
        self.set_status(&job.id, JobStatus::Completed);
        self.persist_status(&job.id, JobStatus::Completed).await;

        if job.skill() == DEPLOY_PAYLOAD_SKILL {
            self.services
                .lock()
                .unwrap()
                .insert(job.id.clone(), worker.addr.clone());
        }

        self.resolve_dependents(&job.id);
    }

    /// Retry state machine: FAILED -> PENDING while the retry budget holds,
    /// DEAD afterwards. Dead jobs never resolve dependents, so children of a
    /// dead parent starve deliberately.
    pub async fn handle_failure(&self, mut job: Job) {
        job.increment_retry();
        if job.retry_count > self.config.max_retries {
            error!(job = %job.id, retries = job.retry_count, "retries exhausted, dead-lettering");
            job.status = JobStatus::Dead;
            self.set_status(&job.id, JobStatus::Dead);
            self.persist_status(&job.id, JobStatus::Dead).await;
            self.dead_letter.lock().unwrap().push(job);
        } else {
            warn!(
                job = %job.id,
                retry = job.retry_count,
                max = self.config.max_retries,
                "job failed, retrying"
            );
            job.status = JobStatus::Failed;
            self.set_status(&job.id, JobStatus::Failed);
            job.status = JobStatus::Pending;
            self.set_status(&job.id, JobStatus::Pending);
            self.persist_status(&job.id, JobStatus::Pending).await;
            self.ready.push(job);
        }
    }
}

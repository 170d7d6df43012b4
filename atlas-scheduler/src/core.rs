use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::graph::JobGraph;
use crate::queue::{DelayQueue, ReadyQueue};
use crate::registry::WorkerRegistry;
use crate::staging;
use crate::stats::{JobCounts, ServiceEntry, SystemStats};
use atlas_proto::RpcClient;
use atlas_traits::JobStore;
use atlas_types::{DagJobSpec, Job, JobId, JobStatus, WorkerAddr, DAG_ID_PREFIX};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const ACTIVE_JOBS_SET: &str = "jobs:active";

/// Shared mutable state behind every scheduler loop. Each structure is
/// individually synchronized; job status transitions are single-writer at any
/// instant (submission handlers create PENDING jobs, only the dispatcher
/// moves them onward).
pub struct SchedulerCore {
    pub config: SchedulerConfig,
    pub store: Arc<dyn JobStore>,
    pub client: RpcClient,
    pub registry: WorkerRegistry,
    pub ready: ReadyQueue,
    pub waiting: DelayQueue,
    /// Admitted jobs whose dependencies are not yet satisfied.
    pub blocked: Mutex<HashMap<JobId, Job>>,
    /// Jobs that exhausted their retry budget. Terminal, never re-queued.
    pub dead_letter: Mutex<Vec<Job>>,
    /// Status of every admitted job, the source for status queries.
    pub board: Mutex<HashMap<JobId, JobStatus>>,
    /// Job id -> worker that ran it, read by affinity placement.
    pub bindings: Mutex<HashMap<JobId, WorkerAddr>>,
    /// Live deployed services, for STOP routing.
    pub services: Mutex<HashMap<JobId, WorkerAddr>>,
}

impl SchedulerCore {
    pub fn new(config: SchedulerConfig, store: Arc<dyn JobStore>) -> Self {
        let registry = WorkerRegistry::new(config.max_worker_capacity);
        Self {
            config,
            store,
            client: RpcClient::new(),
            registry,
            ready: ReadyQueue::new(),
            waiting: DelayQueue::new(),
            blocked: Mutex::new(HashMap::new()),
            dead_letter: Mutex::new(Vec::new()),
            board: Mutex::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Route an admitted, dependency-free job to the ready queue, or to the
    /// waiting room when its scheduled time is in the future.
    pub fn enqueue(&self, job: Job) {
        if job.is_due(Utc::now()) {
            debug!(job = %job.id, "queueing job");
            self.ready.push(job);
        } else {
            debug!(job = %job.id, scheduled_at = %job.scheduled_at, "delaying job");
            self.waiting.push(job);
        }
    }

    /// Admit a single ad-hoc job: record it, persist it, queue it.
    pub async fn submit_job(&self, job: Job) {
        info!(job = %job.id, payload = %job.payload, "job submitted");
        self.board
            .lock()
            .unwrap()
            .insert(job.id.clone(), JobStatus::Pending);
        self.persist_job(&job).await;
        if job.is_ready() {
            self.enqueue(job);
        } else {
            self.blocked.lock().unwrap().insert(job.id.clone(), job);
        }
    }

    /// `SUBMIT <skill>|<data>[|<priority>[|<delay_ms>]]`
    pub async fn submit_adhoc(&self, spec: &str) -> Result<JobId> {
        let parts: Vec<&str> = spec.split('|').collect();
        let payload = if parts.len() > 1 {
            format!("{}|{}", parts[0].trim(), parts[1].trim())
        } else {
            spec.trim().to_string()
        };
        let priority: i32 = match parts.get(2) {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| SchedulerError::Configuration(format!("bad priority: {p}")))?,
            None => atlas_types::PRIORITY_NORMAL,
        };
        let delay_ms: i64 = match parts.get(3) {
            Some(d) => d
                .trim()
                .parse()
                .map_err(|_| SchedulerError::Configuration(format!("bad delay: {d}")))?,
            None => 0,
        };

        let job = Job::new(payload, priority, delay_ms);
        let id = job.id.clone();
        self.submit_job(job).await;
        Ok(id)
    }

    /// Admit a whole DAG batch atomically. Parse errors and cycles reject the
    /// batch before anything is created, queued, persisted or made visible to
    /// status queries.
    pub async fn submit_dag(&self, defs: &str) -> Result<usize> {
        let specs = defs
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(DagJobSpec::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if specs.is_empty() {
            return Err(SchedulerError::Configuration("empty DAG batch".into()));
        }

        JobGraph::from_specs(&specs)?.validate()?;

        // Payload folding may still reject the batch (unreadable staged file),
        // so build every payload before creating any job.
        let mut payloads = Vec::with_capacity(specs.len());
        for spec in &specs {
            payloads.push(staging::fold_spec_payload(&self.config.staging_dir, spec).await?);
        }

        let count = specs.len();
        for (spec, payload) in specs.into_iter().zip(payloads) {
            let deps: Vec<JobId> = spec
                .deps
                .iter()
                .map(|d| format!("{DAG_ID_PREFIX}{d}"))
                .collect();
            let mut job = Job::with_id(
                spec.namespaced_id(),
                payload,
                spec.priority,
                spec.delay_ms,
                deps,
                spec.affinity,
            );

            // Dependencies on already-completed jobs from earlier submissions
            // are satisfied up front.
            {
                let board = self.board.lock().unwrap();
                let done: Vec<JobId> = job
                    .dependencies
                    .iter()
                    .filter(|d| board.get(*d) == Some(&JobStatus::Completed))
                    .cloned()
                    .collect();
                drop(board);
                for dep in done {
                    job.satisfy(&dep);
                }
            }

            info!(job = %job.id, deps = ?job.dependencies, "DAG job admitted");
            self.submit_job(job).await;
        }
        Ok(count)
    }

    /// A finished parent satisfies its dependents; newly ready jobs leave the
    /// blocked map for the queues. One O(active jobs) scan per completion.
    pub fn resolve_dependents(&self, parent_id: &str) {
        let released: Vec<Job> = {
            let mut blocked = self.blocked.lock().unwrap();
            for job in blocked.values_mut() {
                job.satisfy(parent_id);
            }
            let ready_ids: Vec<JobId> = blocked
                .values()
                .filter(|j| j.is_ready())
                .map(|j| j.id.clone())
                .collect();
            ready_ids
                .iter()
                .filter_map(|id| blocked.remove(id))
                .collect()
        };

        for job in released {
            info!(job = %job.id, parent = parent_id, "dependencies satisfied");
            self.enqueue(job);
        }
    }

    pub fn set_status(&self, id: &JobId, status: JobStatus) {
        self.board.lock().unwrap().insert(id.clone(), status);
    }

    pub async fn persist_job(&self, job: &Job) {
        let ops = [
            (format!("job:{}:status", job.id), job.status.to_string()),
            (format!("job:{}:payload", job.id), job.payload.clone()),
            (format!("job:{}:priority", job.id), job.priority.to_string()),
        ];
        for (key, value) in &ops {
            if let Err(e) = self.store.set(key, value).await {
                warn!(job = %job.id, error = %e, "persist failed");
                return;
            }
        }
        if let Err(e) = self.store.sadd(ACTIVE_JOBS_SET, &job.id).await {
            warn!(job = %job.id, error = %e, "persist failed");
        }
    }

    pub async fn persist_status(&self, id: &JobId, status: JobStatus) {
        let key = format!("job:{id}:status");
        if let Err(e) = self.store.set(&key, &status.to_string()).await {
            warn!(job = %id, error = %e, "persist failed");
        }
    }

    /// Startup recovery: every active-set job left in a non-terminal state is
    /// rebuilt from its stored payload/priority and re-queued PENDING.
    pub async fn recover(&self) -> Result<usize> {
        let ids = self
            .store
            .smembers(ACTIVE_JOBS_SET)
            .await
            .map_err(SchedulerError::store)?;

        let mut recovered = 0;
        for id in ids {
            let status = self
                .store
                .get(&format!("job:{id}:status"))
                .await
                .map_err(SchedulerError::store)?;
            match status.as_deref() {
                Some("COMPLETED") | Some("DEAD") | None => continue,
                _ => {}
            }
            let Some(payload) = self
                .store
                .get(&format!("job:{id}:payload"))
                .await
                .map_err(SchedulerError::store)?
            else {
                warn!(job = %id, "active job has no stored payload, skipping");
                continue;
            };
            let priority = self
                .store
                .get(&format!("job:{id}:priority"))
                .await
                .map_err(SchedulerError::store)?
                .and_then(|p| p.parse().ok())
                .unwrap_or(atlas_types::PRIORITY_NORMAL);

            info!(job = %id, "recovering non-terminal job");
            let job = Job::with_id(id, payload, priority, 0, Vec::new(), false);
            self.submit_job(job).await;
            recovered += 1;
        }
        Ok(recovered)
    }

    pub fn stats(&self) -> SystemStats {
        let mut jobs = JobCounts::default();
        for status in self.board.lock().unwrap().values() {
            match status {
                JobStatus::Pending => jobs.pending += 1,
                JobStatus::Running => jobs.running += 1,
                JobStatus::Completed => jobs.completed += 1,
                JobStatus::Failed => jobs.failed += 1,
                JobStatus::Dead => jobs.dead += 1,
            }
        }

        let dead_letter = self
            .dead_letter
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.id.clone())
            .collect();
        let mut services: Vec<ServiceEntry> = self
            .services
            .lock()
            .unwrap()
            .iter()
            .map(|(id, addr)| ServiceEntry {
                id: id.clone(),
                worker: addr.to_string(),
            })
            .collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));

        SystemStats {
            workers: self.registry.workers(),
            jobs,
            ready_depth: self.ready.len(),
            waiting_depth: self.waiting.len(),
            blocked: self.blocked.lock().unwrap().len(),
            dead_letter,
            services,
        }
    }
}

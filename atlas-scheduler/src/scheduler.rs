use crate::config::SchedulerConfig;
use crate::core::SchedulerCore;
use crate::error::Result;
use crate::server;
use async_trait::async_trait;
use atlas_traits::{JobStore, Lifecycle};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

impl SchedulerCore {
    /// Moves delayed jobs to the ready queue the moment they come due.
    pub async fn clock_watcher_loop(&self) {
        info!("clock watcher running");
        loop {
            let job = self.waiting.take_due().await;
            info!(job = %job.id, "delay elapsed, moving job to ready queue");
            self.ready.push(job);
        }
    }
}

/// An owned scheduler instance: shared state plus the four loops (RPC server,
/// dispatcher, heartbeat monitor, clock watcher). Multiple instances can
/// coexist in one process; tests bind port 0.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, store: Arc<dyn JobStore>) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(config, store)),
            tasks: Vec::new(),
            local_addr: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            SchedulerConfig::default(),
            Arc::new(atlas_storage::MemoryStore::new()),
        )
    }

    pub fn core(&self) -> Arc<SchedulerCore> {
        self.core.clone()
    }

    /// Address the RPC server is bound to, available after `start`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start_inner(&mut self) -> Result<()> {
        let recovered = self.core.recover().await?;
        if recovered > 0 {
            info!(jobs = recovered, "recovered non-terminal jobs from store");
        }

        let listener = TcpListener::bind(("0.0.0.0", self.core.config.port)).await?;
        self.local_addr = Some(listener.local_addr()?);
        info!(addr = %self.local_addr.unwrap(), "scheduler starting");

        let core = self.core.clone();
        self.tasks
            .push(tokio::spawn(
                async move { server::serve(core, listener).await },
            ));

        let core = self.core.clone();
        self.tasks
            .push(tokio::spawn(async move { core.dispatch_loop().await }));

        let core = self.core.clone();
        self.tasks
            .push(tokio::spawn(async move { core.heartbeat_loop().await }));

        let core = self.core.clone();
        self.tasks
            .push(tokio::spawn(async move { core.clock_watcher_loop().await }));

        Ok(())
    }

    pub fn stop_inner(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.local_addr = None;
        info!("scheduler stopped");
    }
}

#[async_trait]
impl Lifecycle for Scheduler {
    async fn start(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.start_inner().await.map_err(Into::into)
    }

    async fn stop(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.stop_inner();
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

use crate::error::{Result, WorkerError};
use crate::handler::{EchoHandler, HandlerRegistry};
use crate::service::ServiceTable;
use atlas_proto::{read_frame, write_frame, RpcClient};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Port this worker serves on. 0 binds an ephemeral port.
    pub port: u16,
    pub scheduler_host: String,
    pub scheduler_port: u16,
    pub capabilities: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            scheduler_host: "127.0.0.1".to_string(),
            scheduler_port: 9090,
            capabilities: vec!["GENERAL".to_string()],
        }
    }
}

struct WorkerInner {
    handlers: HandlerRegistry,
    services: Arc<ServiceTable>,
    /// In-flight execution count, reported to the scheduler on every PING.
    load: AtomicU32,
}

/// A worker node: serves EXECUTE/PING/STOP over the framed protocol and
/// announces itself to the scheduler on startup.
pub struct WorkerNode {
    config: WorkerConfig,
    inner: Arc<WorkerInner>,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl WorkerNode {
    pub fn new(config: WorkerConfig) -> Self {
        let handlers = HandlerRegistry::new();
        // Every announced capability answers with the echo handler until a
        // real backend is registered over it.
        for capability in &config.capabilities {
            handlers.register(capability.clone(), Arc::new(EchoHandler));
        }
        Self {
            config,
            inner: Arc::new(WorkerInner {
                handlers,
                services: Arc::new(ServiceTable::new()),
                load: AtomicU32::new(0),
            }),
            task: None,
            local_addr: None,
        }
    }

    pub fn register_handler(&self, skill: impl Into<String>, handler: Arc<dyn atlas_traits::TaskHandler>) {
        self.inner.handlers.register(skill, handler);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Table of long-running services on this worker. Deploy-style handlers
    /// hold a clone of this to register what they start.
    pub fn services(&self) -> Arc<ServiceTable> {
        self.inner.services.clone()
    }

    pub fn current_load(&self) -> u32 {
        self.inner.load.load(Ordering::SeqCst)
    }

    /// Bind, register with the scheduler, and serve until stopped.
    pub async fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!(addr = %local_addr, capabilities = ?self.config.capabilities, "worker starting");

        self.register_with_scheduler(local_addr.port()).await?;

        let inner = self.inner.clone();
        self.task = Some(tokio::spawn(async move {
            serve(inner, listener).await;
        }));
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.local_addr = None;
        info!("worker stopped");
    }

    async fn register_with_scheduler(&self, port: u16) -> Result<()> {
        let request = format!(
            "REGISTER||{}||{}",
            port,
            self.config.capabilities.join(",")
        );
        let response = RpcClient::new()
            .request(&self.config.scheduler_host, self.config.scheduler_port, &request)
            .await?;
        if response != "REGISTERED" {
            return Err(WorkerError::RegistrationRejected(response));
        }
        info!(
            scheduler = %format!("{}:{}", self.config.scheduler_host, self.config.scheduler_port),
            "registered with scheduler"
        );
        Ok(())
    }
}

impl Drop for WorkerNode {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn serve(inner: Arc<WorkerInner>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let inner = inner.clone();
                tokio::spawn(async move {
                    handle_connection(inner, stream).await;
                    debug!(%peer, "connection closed");
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn handle_connection(inner: Arc<WorkerInner>, mut stream: TcpStream) {
    let request = match read_frame(&mut stream).await {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "bad frame, dropping connection");
            return;
        }
    };

    let response = process_command(&inner, &request).await;
    if let Err(e) = write_frame(&mut stream, &response).await {
        debug!(error = %e, "failed to write response");
    }
}

async fn process_command(inner: &WorkerInner, request: &str) -> String {
    if let Some(job_data) = request.strip_prefix("EXECUTE ") {
        return execute(inner, job_data).await;
    }
    if request.trim().eq_ignore_ascii_case("PING") {
        return format!("PONG|{}", inner.load.load(Ordering::SeqCst));
    }
    if let Some(rest) = request.strip_prefix("STOP|") {
        let id = rest.trim();
        return if inner.services.stop(id) {
            format!("STOPPED|{id}")
        } else {
            format!("ERROR: unknown service id: {id}")
        };
    }
    "UNKNOWN_COMMAND".to_string()
}

async fn execute(inner: &WorkerInner, job_data: &str) -> String {
    let mut parts = job_data.splitn(2, '|');
    let skill = parts.next().unwrap_or("").trim();
    let Some(payload) = parts.next() else {
        return "INVALID_JOB_FORMAT".to_string();
    };

    let Some(handler) = inner.handlers.get(skill) else {
        warn!(%skill, "no handler for requested skill");
        return format!("ERROR: no handler for {skill}");
    };

    inner.load.fetch_add(1, Ordering::SeqCst);
    let result = handler.execute(payload).await;
    inner.load.fetch_sub(1, Ordering::SeqCst);

    match result {
        Ok(output) => output,
        Err(e) => {
            error!(%skill, error = %e, "handler failed");
            format!("JOB_FAILED: {e}")
        }
    }
}

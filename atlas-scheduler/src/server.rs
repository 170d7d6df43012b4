//! Scheduler-facing RPC server: one TCP connection per request, dispatch
//! keyed on the leading command token. Per-connection failures are logged and
//! dropped; the accept loop stays alive across arbitrarily many of them.

use crate::core::SchedulerCore;
use crate::staging;
use atlas_proto::{read_frame, write_frame};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

pub async fn serve(core: Arc<SchedulerCore>, listener: TcpListener) {
    info!(addr = ?listener.local_addr().ok(), "scheduler server listening");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let core = core.clone();
                tokio::spawn(async move {
                    handle_connection(core, stream, peer.ip()).await;
                });
            }
            Err(e) => {
                error!(error = %e, "accept failed");
            }
        }
    }
}

async fn handle_connection(core: Arc<SchedulerCore>, mut stream: TcpStream, peer: IpAddr) {
    let request = match read_frame(&mut stream).await {
        Ok(r) => r,
        Err(e) => {
            // Oversized or truncated frame: drop the connection, no retry.
            debug!(%peer, error = %e, "bad frame, dropping connection");
            return;
        }
    };
    debug!(%peer, request = %request, "request");

    let response = handle_command(&core, &request, peer).await;
    if let Err(e) = write_frame(&mut stream, &response).await {
        debug!(%peer, error = %e, "failed to write response");
    }
}

pub async fn handle_command(core: &SchedulerCore, request: &str, peer: IpAddr) -> String {
    let request = request.trim();

    if let Some(rest) = request.strip_prefix("REGISTER") {
        return handle_register(core, rest, peer);
    }
    if let Some(defs) = request.strip_prefix("SUBMIT_DAG") {
        return match core.submit_dag(defs).await {
            Ok(count) => {
                info!(jobs = count, "DAG batch accepted");
                "DAG_ACCEPTED".to_string()
            }
            Err(e) => format!("ERROR: {e}"),
        };
    }
    if let Some(spec) = request.strip_prefix("SUBMIT") {
        return match core.submit_adhoc(spec.trim()).await {
            Ok(_) => "JOB_ACCEPTED".to_string(),
            Err(e) => format!("ERROR: {e}"),
        };
    }
    if request.eq_ignore_ascii_case("STATS_JSON") {
        return core.stats().to_json();
    }
    if request.eq_ignore_ascii_case("STATS") {
        return core.stats().render_text();
    }
    if let Some(rest) = request.strip_prefix("STOP") {
        return handle_stop(core, rest).await;
    }
    if let Some(rest) = request.strip_prefix("RUN|") {
        return match staging::fold_run(&core.config.staging_dir, rest.trim()).await {
            Ok(payload) => {
                core.submit_job(atlas_types::Job::new(payload, atlas_types::PRIORITY_NORMAL, 0))
                    .await;
                "JOB_QUEUED".to_string()
            }
            Err(e) => format!("ERROR: {e}"),
        };
    }
    if let Some(rest) = request.strip_prefix("DEPLOY|") {
        let mut parts = rest.splitn(2, '|');
        let file = parts.next().unwrap_or("").trim();
        let port = parts.next().unwrap_or("").trim();
        return match staging::fold_deploy(&core.config.staging_dir, file, port).await {
            Ok(payload) => {
                core.submit_job(atlas_types::Job::new(payload, atlas_types::PRIORITY_NORMAL, 0))
                    .await;
                "DEPLOY_QUEUED".to_string()
            }
            Err(e) => format!("ERROR: {e}"),
        };
    }
    if request.eq_ignore_ascii_case("PING") {
        return "PONG".to_string();
    }

    "UNKNOWN_COMMAND".to_string()
}

/// `REGISTER||<port>||<capability[,capability...]>`; the host is taken from
/// the connection's peer address.
fn handle_register(core: &SchedulerCore, rest: &str, peer: IpAddr) -> String {
    let parts: Vec<&str> = rest.split("||").collect();
    let Some(port) = parts.get(1).and_then(|p| p.trim().parse::<u16>().ok()) else {
        return "ERROR: bad REGISTER port".to_string();
    };
    let capabilities = parts
        .get(2)
        .map(|caps| {
            caps.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect()
        })
        .filter(|caps: &std::collections::HashSet<String>| !caps.is_empty())
        .unwrap_or_else(|| std::collections::HashSet::from(["GENERAL".to_string()]));

    core.registry
        .add_worker(&peer.to_string(), port, capabilities);
    "REGISTERED".to_string()
}

/// `STOP|<service-id>`: forward to the worker hosting the service and relay
/// its answer.
async fn handle_stop(core: &SchedulerCore, rest: &str) -> String {
    let id = rest.trim_start_matches('|').trim();
    if id.is_empty() {
        return "ERROR: missing service id".to_string();
    }
    let Some(addr) = core.services.lock().unwrap().get(id).cloned() else {
        return format!("ERROR: unknown service id: {id}");
    };

    let result = core
        .client
        .request_timeout(
            &addr.host,
            addr.port,
            &format!("STOP|{id}"),
            Duration::from_secs(core.config.execute_timeout_secs),
        )
        .await;
    match result {
        Ok(response) => {
            if response.starts_with("STOPPED") {
                core.services.lock().unwrap().remove(id);
            }
            response
        }
        Err(e) => format!("ERROR: stop rpc failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use atlas_storage::MemoryStore;
    use atlas_types::JobStatus;
    use std::net::Ipv4Addr;

    fn core() -> SchedulerCore {
        SchedulerCore::new(SchedulerConfig::default(), Arc::new(MemoryStore::new()))
    }

    fn peer() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[tokio::test]
    async fn register_records_worker_with_peer_host() {
        let core = core();
        let resp = handle_command(&core, "REGISTER||8181||PDF_CONVERT,TEST", peer()).await;
        assert_eq!(resp, "REGISTERED");

        let workers = core.registry.workers();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].addr.host, "127.0.0.1");
        assert_eq!(workers[0].addr.port, 8181);
        assert!(workers[0].has_capability("TEST"));
    }

    #[tokio::test]
    async fn register_defaults_to_general() {
        let core = core();
        assert_eq!(handle_command(&core, "REGISTER||8181", peer()).await, "REGISTERED");
        assert!(core.registry.workers()[0].has_capability("GENERAL"));
    }

    #[tokio::test]
    async fn submit_accepts_and_queues() {
        let core = core();
        let resp = handle_command(&core, "SUBMIT TEST|hello|2|0", peer()).await;
        assert_eq!(resp, "JOB_ACCEPTED");
        let job = core.ready.pop().unwrap();
        assert_eq!(job.payload, "TEST|hello");
        assert_eq!(job.priority, 2);
    }

    #[tokio::test]
    async fn submit_with_bad_priority_is_an_error() {
        let core = core();
        let resp = handle_command(&core, "SUBMIT TEST|hello|urgent", peer()).await;
        assert!(resp.starts_with("ERROR:"), "{resp}");
        assert!(core.ready.pop().is_none());
    }

    #[tokio::test]
    async fn cyclic_dag_batch_is_invisible() {
        let core = core();
        let resp = handle_command(
            &core,
            "SUBMIT_DAG A|TEST|x|1|0|[C] ; B|TEST|x|1|0|[A] ; C|TEST|x|1|0|[B]",
            peer(),
        )
        .await;
        assert!(resp.starts_with("ERROR:"), "{resp}");

        // Atomic rejection: nothing admitted anywhere.
        assert!(core.board.lock().unwrap().is_empty());
        assert!(core.ready.is_empty());
        assert!(core.waiting.is_empty());
        assert!(core.blocked.lock().unwrap().is_empty());
        let stats = core.stats();
        assert_eq!(stats.jobs.pending, 0);
    }

    #[tokio::test]
    async fn dag_batch_admits_roots_and_blocks_children() {
        let core = core();
        let resp =
            handle_command(&core, "SUBMIT_DAG A|TEST|x|2|0|[] ; B|TEST|x|1|0|[A]", peer()).await;
        assert_eq!(resp, "DAG_ACCEPTED");

        let root = core.ready.pop().unwrap();
        assert_eq!(root.id, "DAG-A");
        assert!(core.blocked.lock().unwrap().contains_key("DAG-B"));
        assert_eq!(
            core.board.lock().unwrap().get("DAG-B"),
            Some(&JobStatus::Pending)
        );
    }

    #[tokio::test]
    async fn malformed_dag_line_rejects_whole_batch() {
        let core = core();
        let resp =
            handle_command(&core, "SUBMIT_DAG A|TEST|x|1|0|[] ; B|TEST|x|nope|0|[A]", peer()).await;
        assert!(resp.starts_with("ERROR:"), "{resp}");
        assert!(core.board.lock().unwrap().is_empty());
        assert!(core.ready.is_empty());
    }

    #[tokio::test]
    async fn stop_unknown_service() {
        let core = core();
        let resp = handle_command(&core, "STOP|ghost", peer()).await;
        assert_eq!(resp, "ERROR: unknown service id: ghost");
    }

    #[tokio::test]
    async fn ping_and_unknown() {
        let core = core();
        assert_eq!(handle_command(&core, "PING", peer()).await, "PONG");
        assert_eq!(
            handle_command(&core, "FROBNICATE", peer()).await,
            "UNKNOWN_COMMAND"
        );
    }

    #[tokio::test]
    async fn stats_json_is_valid_json() {
        let core = core();
        handle_command(&core, "SUBMIT TEST|x", peer()).await;
        let resp = handle_command(&core, "STATS_JSON", peer()).await;
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["jobs"]["pending"], 1);
        assert_eq!(parsed["ready_depth"], 1);
    }
}

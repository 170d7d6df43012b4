//! End-to-end scheduler tests over real TCP: ad-hoc submission, delayed
//! execution, retry exhaustion, recovery, and heartbeat-driven exclusion.

mod common;

use atlas_proto::RpcClient;
use atlas_storage::MemoryStore;
use atlas_traits::JobStore;
use atlas_types::JobStatus;
use common::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn adhoc_job_executes_on_capable_worker() {
    let (scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let _worker = start_worker(addr, &["TEST"]).await;
    let core = scheduler.core();

    let resp = RpcClient::new()
        .request("127.0.0.1", addr.port(), "SUBMIT TEST|hello")
        .await
        .unwrap();
    assert_eq!(resp, "JOB_ACCEPTED");

    let done = wait_for(Duration::from_secs(5), || {
        core.board
            .lock()
            .unwrap()
            .values()
            .any(|s| *s == JobStatus::Completed)
    })
    .await;
    assert!(done, "job should complete");
    assert_eq!(core.stats().jobs.completed, 1);
}

#[tokio::test]
async fn immediate_job_is_never_delayed() {
    let (scheduler, _addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let core = scheduler.core();

    core.submit_adhoc("TEST|now").await.unwrap();
    // No worker yet: the job must sit in the ready path, not the waiting room.
    assert!(core.waiting.is_empty());
    let stats = core.stats();
    assert_eq!(stats.jobs.pending + stats.jobs.running, 1);
}

#[tokio::test]
async fn delayed_job_waits_for_its_scheduled_time() {
    let (scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let _worker = start_worker(addr, &["TEST"]).await;
    let core = scheduler.core();

    core.submit_adhoc("TEST|later|1|400").await.unwrap();
    assert_eq!(core.waiting.len(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        core.stats().jobs.completed,
        0,
        "job must not run before its delay elapses"
    );

    let done = wait_for(Duration::from_secs(5), || core.stats().jobs.completed == 1).await;
    assert!(done, "delayed job should eventually complete");
    assert!(core.waiting.is_empty());
}

#[tokio::test]
async fn failing_job_retries_then_dead_letters() {
    let (scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let worker = start_worker(addr, &["FLAKY"]).await;
    worker.register_handler("FLAKY", Arc::new(FailingHandler));
    let core = scheduler.core();

    let id = core.submit_adhoc("FLAKY|x").await.unwrap();

    let dead = wait_for(Duration::from_secs(10), || core.stats().jobs.dead == 1).await;
    assert!(dead, "job should exhaust retries and die");

    let dead_letter = core.dead_letter.lock().unwrap();
    assert_eq!(dead_letter.len(), 1);
    assert_eq!(dead_letter[0].id, id);
    // Strictly increasing retry count, one past the budget.
    assert_eq!(dead_letter[0].retry_count, 4);
    drop(dead_letter);

    // DEAD is terminal: nothing left in any queue.
    assert!(core.ready.is_empty());
    assert!(core.waiting.is_empty());
}

#[tokio::test]
async fn unresponsive_worker_is_excluded_from_placement() {
    let (scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let core = scheduler.core();

    // Register a worker address nobody listens on: bind-then-drop a port.
    let ghost_port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let resp = RpcClient::new()
        .request(
            "127.0.0.1",
            addr.port(),
            &format!("REGISTER||{ghost_port}||TEST"),
        )
        .await
        .unwrap();
    assert_eq!(resp, "REGISTERED");

    let marked = wait_for(Duration::from_secs(5), || {
        core.registry.workers().iter().any(|w| !w.alive)
    })
    .await;
    assert!(marked, "heartbeat should mark the silent worker dead");

    // Even as the only capable worker, it must not be selected: the job
    // stalls in the pending/ready cycle instead.
    core.submit_adhoc("TEST|x").await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let stats = core.stats();
    assert_eq!(stats.jobs.completed, 0);
    assert_eq!(stats.jobs.dead, 0);
    assert_eq!(stats.jobs.pending + stats.jobs.running, 1);
}

#[tokio::test]
async fn heartbeat_refreshes_load_from_live_worker() {
    let (scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    let _worker = start_worker(addr, &["TEST"]).await;
    let core = scheduler.core();

    let seen = wait_for(Duration::from_secs(5), || {
        core.registry
            .workers()
            .iter()
            .any(|w| w.alive && w.current_load == 0)
    })
    .await;
    assert!(seen, "heartbeat should observe the live worker");
}

#[tokio::test]
async fn non_terminal_jobs_are_requeued_on_startup() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    store.sadd("jobs:active", "j-recovered").await.unwrap();
    store.set("job:j-recovered:status", "RUNNING").await.unwrap();
    store.set("job:j-recovered:payload", "TEST|x").await.unwrap();
    store.set("job:j-recovered:priority", "2").await.unwrap();
    // Terminal jobs stay put.
    store.sadd("jobs:active", "j-done").await.unwrap();
    store.set("job:j-done:status", "COMPLETED").await.unwrap();

    let (scheduler, addr) = start_scheduler(fast_config(), store).await;
    let _worker = start_worker(addr, &["TEST"]).await;
    let core = scheduler.core();

    let done = wait_for(Duration::from_secs(5), || {
        core.board.lock().unwrap().get("j-recovered") == Some(&JobStatus::Completed)
    })
    .await;
    assert!(done, "recovered job should run to completion");
    assert!(!core.board.lock().unwrap().contains_key("j-done"));
}

#[tokio::test]
async fn scheduler_stops_cleanly() {
    let (mut scheduler, addr) = start_scheduler(fast_config(), Arc::new(MemoryStore::new())).await;
    assert!(atlas_traits::Lifecycle::is_running(&scheduler));

    scheduler.stop_inner();
    assert!(!atlas_traits::Lifecycle::is_running(&scheduler));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = RpcClient::new()
        .request("127.0.0.1", addr.port(), "PING")
        .await;
    assert!(err.is_err(), "stopped scheduler should refuse connections");
}

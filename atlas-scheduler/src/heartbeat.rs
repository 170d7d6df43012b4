//! Scheduler-to-worker liveness probing. The sole source of liveness and
//! load freshness consumed by placement.

use crate::core::SchedulerCore;
use std::time::Duration;
use tracing::{debug, info, warn};

impl SchedulerCore {
    pub async fn heartbeat_loop(&self) {
        info!(
            initial_secs = self.config.heartbeat_initial_secs,
            interval_secs = self.config.heartbeat_interval_secs,
            "heartbeat monitor running"
        );
        tokio::time::sleep(Duration::from_secs(self.config.heartbeat_initial_secs)).await;
        loop {
            self.check_heartbeats().await;
            tokio::time::sleep(Duration::from_secs(self.config.heartbeat_interval_secs)).await;
        }
    }

    pub async fn check_heartbeats(&self) {
        let timeout = Duration::from_secs(self.config.heartbeat_timeout_secs);
        for worker in self.registry.workers() {
            let result = self
                .client
                .request_timeout(&worker.addr.host, worker.addr.port, "PING", timeout)
                .await;
            match result {
                Ok(response) if response.starts_with("PONG") => {
                    // `PONG` alone refreshes liveness; `PONG|<load>` also
                    // reports the in-flight count.
                    let load = response
                        .split('|')
                        .nth(1)
                        .and_then(|l| l.trim().parse::<u32>().ok());
                    debug!(worker = %worker.addr, ?load, "heartbeat ok");
                    self.registry.update_liveness(&worker.addr, load);
                }
                Ok(response) => {
                    warn!(worker = %worker.addr, %response, "unexpected heartbeat response");
                    self.registry.mark_dead(&worker.addr);
                }
                Err(e) => {
                    warn!(worker = %worker.addr, error = %e, "heartbeat failed");
                    self.registry.mark_dead(&worker.addr);
                }
            }
        }
    }
}

//! Idle session eviction

use super::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically close sessions idle for longer than `timeout` until
/// `cancel` fires.
pub fn spawn_idle_reaper(
    registry: Arc<SessionRegistry>,
    timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = timeout.min(MAX_SWEEP_INTERVAL).max(Duration::from_millis(10));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Idle session reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    for id in registry.reap_idle(timeout) {
                        warn!("Session {} idle for over {:?}, closed", id, timeout);
                    }
                }
            }
        }
    })
}

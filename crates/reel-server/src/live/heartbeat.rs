//! Periodic heartbeat sweep.
//!
//! The sweep never touches the registry itself: it asks the actor for a
//! snapshot and submits removals through [`BrokerHandle::release`], which
//! leaves a replacement registered under the same ID untouched.

use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::broker::{BrokerHandle, RemoveReason};
use crate::metrics::{HEARTBEAT_SWEEPS_TOTAL, SEND_FAILURES_TOTAL};

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Clients pinged successfully.
    pub pinged: usize,
    /// Clients evicted for staleness (no ping attempted).
    pub stale: usize,
    /// Clients evicted because the ping failed.
    pub failed: usize,
}

/// Sweep every `interval` until `cancel` fires. The first sweep happens one
/// full interval after start.
pub async fn run_heartbeat(
    handle: BrokerHandle,
    interval: Duration,
    stale_after: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = sweep(&handle, stale_after).await;
                debug!(
                    pinged = report.pinged,
                    stale = report.stale,
                    failed = report.failed,
                    "heartbeat sweep"
                );
            }
        }
    }
    debug!("heartbeat stopped");
}

/// Ping every registered client once.
///
/// Clients whose last successful ping is older than `stale_after` are removed
/// without another write. The rest are pinged concurrently; failures are
/// removed.
pub async fn sweep(handle: &BrokerHandle, stale_after: Duration) -> SweepReport {
    let (stale, live): (Vec<_>, Vec<_>) = handle
        .snapshot()
        .await
        .into_iter()
        .partition(|client| client.since_last_ping() > stale_after);

    for client in &stale {
        warn!(
            client_id = %client.id(),
            idle_secs = client.since_last_ping().as_secs(),
            "client stale, evicting"
        );
        handle.release(client, RemoveReason::Stale);
    }

    let results = join_all(
        live.iter()
            .map(|client| async move { (client, client.send_ping().await) }),
    )
    .await;

    let mut failed = 0;
    for (client, result) in results {
        if let Err(error) = result {
            failed += 1;
            counter!(SEND_FAILURES_TOTAL).increment(1);
            warn!(client_id = %client.id(), %error, "ping failed, evicting client");
            handle.release(client, RemoveReason::PingFailed);
        }
    }

    counter!(HEARTBEAT_SWEEPS_TOTAL).increment(1);
    SweepReport {
        pinged: live.len() - failed,
        stale: stale.len(),
        failed,
    }
}

//! Background expiry.
//!
//! Claims and renewals already expire overdue holds lazily; the sweeper makes
//! sure abandoned holds are expired (and their rooms told) even when nobody
//! touches the car again.

use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, root_span};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info};

use crate::broadcast::RoomBroadcaster;
use crate::manager::HoldManager;

/// Spawn the sweep loop on the current runtime. Abort the handle to stop it.
pub fn spawn_expiry_sweeper<B>(manager: Arc<HoldManager<B>>, interval: Duration) -> JoinHandle<()>
where
    B: RoomBroadcaster + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");

        loop {
            ticker.tick().await;

            let span = root_span("expiry_sweep", &TraceId::new());
            let report = manager.sweep_expired().instrument(span).await;

            if report.expired > 0 || report.slots_pruned > 0 {
                info!(
                    expired = report.expired,
                    tombstones_dropped = report.tombstones_dropped,
                    slots_pruned = report.slots_pruned,
                    "sweep pass complete"
                );
            } else {
                debug!("sweep pass found nothing to do");
            }
        }
    })
}

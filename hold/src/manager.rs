//! HoldManager
//!
//! Single source of truth for which room holds which car.
//!
//! Locking model:
//!   • `slots` is an index from car id to that car's slot. Its lock is held
//!     only long enough to look up or insert an `Arc`, never across `.await`.
//!   • Each slot has its own async mutex. Every mutation of a car's hold,
//!     including lazy expiry and the sweeper, runs inside that car's section,
//!     so unrelated cars never serialize behind each other.
//!   • Events are published inside the section. An `expired` event therefore
//!     always reaches the old room before another room's claim can succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use common::time::Clock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::broadcast::RoomBroadcaster;
use crate::config::HoldConfig;
use crate::error::HoldError;
use crate::model::{CarId, Hold, HoldSnapshot, HoldStatus};
use crate::room_key::RoomKey;

const SLOW_SECTION: Duration = Duration::from_millis(50);

/// Per-car state.
#[derive(Debug, Default)]
struct CarSlot {
    /// The hold currently blocking the car: `Active` or `Converted`.
    current: Option<Hold>,
    /// Last released/expired hold, kept for `inspect` and idempotent release.
    tombstone: Option<Hold>,
}

impl CarSlot {
    fn is_empty(&self) -> bool {
        self.current.is_none() && self.tombstone.is_none()
    }
}

type SharedSlot = Arc<Mutex<CarSlot>>;

/// Outcome of one sweeper pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub tombstones_dropped: usize,
    pub slots_pruned: usize,
}

pub struct HoldManager<B: RoomBroadcaster> {
    cfg: HoldConfig,
    slots: parking_lot::Mutex<HashMap<CarId, SharedSlot>>,
    broadcaster: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<B: RoomBroadcaster> HoldManager<B> {
    pub fn new(cfg: HoldConfig, broadcaster: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        info!(
            hold_duration_ms = cfg.hold_duration_ms(),
            tombstone_retention_ms = cfg.tombstone_retention_ms(),
            "hold manager initialized"
        );

        Self {
            cfg,
            slots: parking_lot::Mutex::new(HashMap::new()),
            broadcaster,
            clock,
        }
    }

    /// Claim `car_id` for `room`.
    ///
    /// - free car → new active hold
    /// - same room already holding → idempotent renewal
    /// - another room holding, or converted → `Conflict`
    #[instrument(skip(self), target = "holds", fields(car_id = %car_id, room = %room))]
    pub async fn claim(&self, car_id: &str, room: &RoomKey) -> Result<Hold, HoldError> {
        let slot = self.slot_or_insert(car_id);
        let mut guard = self.enter(&slot).await;
        let now = self.clock.now_ms();

        self.expire_if_overdue(&mut guard, now);

        let duration_ms = self.cfg.hold_duration_ms();

        match guard.current.as_mut() {
            Some(h) if h.status == HoldStatus::Converted => {
                warn!("claim rejected: car already converted into a booking");
                Err(conflict(car_id))
            }
            Some(h) if h.is_owned_by(room) => {
                h.extend(now, duration_ms);
                debug!(expires_at_ms = h.expires_at_ms, "claim by holder treated as renewal");

                let hold = h.clone();
                self.broadcaster.publish(&hold.room, hold.event());
                Ok(hold)
            }
            Some(_) => {
                warn!("claim rejected: car held by another room");
                Err(conflict(car_id))
            }
            None => {
                let hold = Hold::new(car_id, room, now, duration_ms);
                guard.current = Some(hold.clone());
                guard.tombstone = None;

                info!(
                    hold_id = %hold.hold_id,
                    expires_at_ms = hold.expires_at_ms,
                    "hold claimed"
                );

                self.broadcaster.publish(&hold.room, hold.event());
                Ok(hold)
            }
        }
    }

    /// Push the deadline out by another hold duration. Owner only.
    #[instrument(skip(self), target = "holds", fields(car_id = %car_id, room = %room))]
    pub async fn renew(&self, car_id: &str, room: &RoomKey) -> Result<Hold, HoldError> {
        let slot = self.existing_slot(car_id).ok_or_else(|| not_found(car_id))?;
        let mut guard = self.enter(&slot).await;
        let now = self.clock.now_ms();

        self.expire_if_overdue(&mut guard, now);

        match guard.current.as_mut() {
            Some(h) if h.status == HoldStatus::Active => {
                if !h.is_owned_by(room) {
                    warn!("renew rejected: caller does not own the hold");
                    return Err(forbidden(car_id));
                }

                h.extend(now, self.cfg.hold_duration_ms());
                info!(
                    hold_id = %h.hold_id,
                    expires_at_ms = h.expires_at_ms,
                    renewals = h.renewals,
                    "hold renewed"
                );

                let hold = h.clone();
                self.broadcaster.publish(&hold.room, hold.event());
                Ok(hold)
            }
            _ => Err(not_found(car_id)),
        }
    }

    /// Give the car back. Owner only; repeated calls by the owner succeed.
    #[instrument(skip(self), target = "holds", fields(car_id = %car_id, room = %room))]
    pub async fn release(&self, car_id: &str, room: &RoomKey) -> Result<(), HoldError> {
        let slot = self.existing_slot(car_id).ok_or_else(|| not_found(car_id))?;
        let mut guard = self.enter(&slot).await;
        let now = self.clock.now_ms();

        self.expire_if_overdue(&mut guard, now);

        let slot = &mut *guard;
        match slot.current.as_ref() {
            Some(h) if !h.is_owned_by(room) => {
                warn!(status = %h.status, "release rejected: caller does not own the hold");
                Err(forbidden(car_id))
            }
            Some(h) if h.status == HoldStatus::Converted => {
                debug!("release after conversion is a no-op");
                Ok(())
            }
            Some(_) => {
                if let Some(mut hold) = slot.current.take() {
                    hold.finish(HoldStatus::Released, now);
                    info!(hold_id = %hold.hold_id, "hold released");

                    self.broadcaster.publish(&hold.room, hold.event());
                    slot.tombstone = Some(hold);
                }
                Ok(())
            }
            None => match slot.tombstone.as_ref() {
                Some(t) if t.is_owned_by(room) => {
                    debug!(status = %t.status, "hold already ended; release is a no-op");
                    Ok(())
                }
                Some(_) => Err(forbidden(car_id)),
                None => Err(not_found(car_id)),
            },
        }
    }

    /// Turn an active hold into a booking. Irreversible; succeeds once per hold.
    #[instrument(skip(self), target = "holds", fields(car_id = %car_id, room = %room))]
    pub async fn convert(&self, car_id: &str, room: &RoomKey) -> Result<Hold, HoldError> {
        let slot = self.existing_slot(car_id).ok_or_else(|| not_found(car_id))?;
        let mut guard = self.enter(&slot).await;
        let now = self.clock.now_ms();

        self.expire_if_overdue(&mut guard, now);

        match guard.current.as_mut() {
            Some(h) if h.status == HoldStatus::Active => {
                if !h.is_owned_by(room) {
                    warn!("convert rejected: caller does not own the hold");
                    return Err(forbidden(car_id));
                }

                h.finish(HoldStatus::Converted, now);
                info!(hold_id = %h.hold_id, "hold converted into booking");

                let hold = h.clone();
                self.broadcaster.publish(&hold.room, hold.event());
                Ok(hold)
            }
            _ => Err(not_found(car_id)),
        }
    }

    /// Called by the booking lifecycle once a converted car may be rented
    /// again. Returns the converted hold that was cleared.
    #[instrument(skip(self), target = "holds", fields(car_id = %car_id))]
    pub async fn reopen(&self, car_id: &str) -> Result<Hold, HoldError> {
        let slot = self.existing_slot(car_id).ok_or_else(|| not_found(car_id))?;
        let mut guard = self.enter(&slot).await;

        match guard.current.take() {
            Some(h) if h.status == HoldStatus::Converted => {
                info!(hold_id = %h.hold_id, "converted car reopened for claims");
                Ok(h)
            }
            other => {
                guard.current = other;
                Err(not_found(car_id))
            }
        }
    }

    /// Current view of the car's hold, if any. Never mutates.
    pub async fn inspect(&self, car_id: &str) -> Option<HoldSnapshot> {
        self.view(car_id, None).await
    }

    /// Like [`inspect`](Self::inspect), and also says whether `room` is the holder.
    pub async fn inspect_for(&self, car_id: &str, room: &RoomKey) -> Option<HoldSnapshot> {
        self.view(car_id, Some(room)).await
    }

    /// Number of holds that are active right now.
    pub async fn active_count(&self) -> usize {
        let now = self.clock.now_ms();
        let mut count = 0;

        for (_, slot) in self.all_slots() {
            let guard = slot.lock().await;
            if guard.current.as_ref().is_some_and(|h| h.is_live(now)) {
                count += 1;
            }
        }

        count
    }

    /// Expire overdue holds, forget old tombstones, prune empty slots.
    #[instrument(skip(self), target = "holds")]
    pub async fn sweep_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let retention_ms = self.cfg.tombstone_retention_ms();

        for (car_id, slot) in self.all_slots() {
            let mut guard = self.enter(&slot).await;
            let now = self.clock.now_ms();

            if self.expire_if_overdue(&mut guard, now) {
                report.expired += 1;
            }

            let stale = guard
                .tombstone
                .as_ref()
                .and_then(|t| t.ended_at_ms)
                .is_some_and(|ended| now.saturating_sub(ended) >= retention_ms);

            if stale {
                guard.tombstone = None;
                report.tombstones_dropped += 1;
                debug!(car_id = %car_id, "tombstone dropped");
            }
        }

        report.slots_pruned = self.prune_empty_slots();
        report
    }

    async fn view(&self, car_id: &str, caller: Option<&RoomKey>) -> Option<HoldSnapshot> {
        let slot = self.existing_slot(car_id)?;
        let guard = slot.lock().await;
        let now = self.clock.now_ms();

        guard
            .current
            .as_ref()
            .or(guard.tombstone.as_ref())
            .map(|h| h.snapshot(now, caller))
    }

    /// Apply the `active -> expired` transition if the deadline has passed.
    /// Must be called with the car's section held.
    fn expire_if_overdue(&self, slot: &mut CarSlot, now: u64) -> bool {
        if !slot.current.as_ref().is_some_and(|h| h.is_overdue(now)) {
            return false;
        }

        let Some(mut hold) = slot.current.take() else {
            return false;
        };

        let deadline = hold.expires_at_ms;
        hold.finish(HoldStatus::Expired, deadline);

        info!(
            car_id = %hold.car_id,
            room = %hold.room,
            hold_id = %hold.hold_id,
            late_by_ms = now.saturating_sub(deadline),
            "hold expired"
        );

        self.broadcaster.publish(&hold.room, hold.event());
        slot.tombstone = Some(hold);
        true
    }

    async fn enter<'a>(&self, slot: &'a SharedSlot) -> MutexGuard<'a, CarSlot> {
        warn_if_slow("car_slot_lock", SLOW_SECTION, slot.lock()).await
    }

    fn slot_or_insert(&self, car_id: &str) -> SharedSlot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(car_id.to_string()).or_default())
    }

    fn existing_slot(&self, car_id: &str) -> Option<SharedSlot> {
        self.slots.lock().get(car_id).cloned()
    }

    fn all_slots(&self) -> Vec<(CarId, SharedSlot)> {
        self.slots
            .lock()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Remove empty slots nobody else references. A slot is only handed out
    /// under the index lock, so with the lock held and a strong count of one
    /// no task can be about to use it.
    fn prune_empty_slots(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();

        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => !guard.is_empty(),
                Err(_) => true,
            }
        });

        before - slots.len()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}

fn conflict(car_id: &str) -> HoldError {
    HoldError::Conflict {
        car_id: car_id.to_string(),
    }
}

fn not_found(car_id: &str) -> HoldError {
    HoldError::NotFound {
        car_id: car_id.to_string(),
    }
}

fn forbidden(car_id: &str) -> HoldError {
    HoldError::Forbidden {
        car_id: car_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use common::time::ManualClock;

    fn manager(clock: Arc<ManualClock>) -> HoldManager<BroadcastHub> {
        let cfg = HoldConfig {
            hold_duration: Duration::from_secs(60),
            tombstone_retention: Duration::from_secs(30),
        };
        HoldManager::new(cfg, Arc::new(BroadcastHub::default()), clock)
    }

    #[tokio::test]
    async fn sweep_prunes_slots_after_retention() {
        let clock = Arc::new(ManualClock::new(0));
        let mgr = manager(clock.clone());
        let a = RoomKey::derive("a");

        mgr.claim("car-1", &a).await.unwrap();
        mgr.release("car-1", &a).await.unwrap();
        assert_eq!(mgr.slot_count(), 1);

        // tombstone still inside retention
        clock.advance_ms(10_000);
        let report = mgr.sweep_expired().await;
        assert_eq!(report.slots_pruned, 0);
        assert!(mgr.inspect("car-1").await.is_some());

        clock.advance_ms(20_000);
        let report = mgr.sweep_expired().await;
        assert_eq!(report.tombstones_dropped, 1);
        assert_eq!(report.slots_pruned, 1);
        assert_eq!(mgr.slot_count(), 0);
        assert!(mgr.inspect("car-1").await.is_none());
    }

    #[tokio::test]
    async fn sweep_keeps_converted_cars_blocked() {
        let clock = Arc::new(ManualClock::new(0));
        let mgr = manager(clock.clone());
        let a = RoomKey::derive("a");

        mgr.claim("car-1", &a).await.unwrap();
        mgr.convert("car-1", &a).await.unwrap();

        clock.advance_ms(3_600_000);
        let report = mgr.sweep_expired().await;

        assert_eq!(report, SweepReport::default());
        assert_eq!(
            mgr.inspect("car-1").await.map(|s| s.status),
            Some(HoldStatus::Converted)
        );
    }

    #[tokio::test]
    async fn reopen_requires_a_converted_hold() {
        let clock = Arc::new(ManualClock::new(0));
        let mgr = manager(clock);
        let a = RoomKey::derive("a");

        mgr.claim("car-1", &a).await.unwrap();
        assert!(matches!(
            mgr.reopen("car-1").await,
            Err(HoldError::NotFound { .. })
        ));
        // the active hold survived the failed reopen
        assert_eq!(
            mgr.inspect("car-1").await.map(|s| s.status),
            Some(HoldStatus::Active)
        );
    }
}

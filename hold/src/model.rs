use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::room_key::RoomKey;

pub type CarId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Expired,
    Released,
    Converted,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Expired => "expired",
            HoldStatus::Released => "released",
            HoldStatus::Converted => "converted",
        }
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One room's time-bounded exclusive claim on one car.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub hold_id: Uuid,
    pub car_id: CarId,
    pub room: RoomKey,

    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    /// Set when the hold leaves `Active`.
    pub ended_at_ms: Option<u64>,

    pub renewals: u32,
    pub status: HoldStatus,
}

impl Hold {
    pub fn new(car_id: &str, room: &RoomKey, now_ms: u64, duration_ms: u64) -> Self {
        Self {
            hold_id: Uuid::new_v4(),
            car_id: car_id.to_string(),
            room: room.clone(),
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(duration_ms),
            ended_at_ms: None,
            renewals: 0,
            status: HoldStatus::Active,
        }
    }

    pub fn is_owned_by(&self, room: &RoomKey) -> bool {
        &self.room == room
    }

    /// Active and not yet past `expires_at_ms`.
    pub fn is_live(&self, now_ms: u64) -> bool {
        self.status == HoldStatus::Active && now_ms < self.expires_at_ms
    }

    /// Still marked active but its deadline has passed.
    pub fn is_overdue(&self, now_ms: u64) -> bool {
        self.status == HoldStatus::Active && now_ms >= self.expires_at_ms
    }

    pub(crate) fn extend(&mut self, now_ms: u64, duration_ms: u64) {
        self.expires_at_ms = now_ms.saturating_add(duration_ms);
        self.renewals = self.renewals.saturating_add(1);
    }

    pub(crate) fn finish(&mut self, status: HoldStatus, at_ms: u64) {
        debug_assert!(status != HoldStatus::Active, "finish() needs a terminal status");
        self.status = status;
        self.ended_at_ms = Some(at_ms);
    }

    /// Status as an observer at `now_ms` should see it.
    pub fn effective_status(&self, now_ms: u64) -> HoldStatus {
        if self.is_overdue(now_ms) {
            HoldStatus::Expired
        } else {
            self.status
        }
    }

    pub fn event(&self) -> HoldEvent {
        HoldEvent {
            car_id: self.car_id.clone(),
            status: self.status,
            expires_at_ms: (self.status == HoldStatus::Active).then_some(self.expires_at_ms),
        }
    }

    pub fn snapshot(&self, now_ms: u64, caller: Option<&RoomKey>) -> HoldSnapshot {
        let status = self.effective_status(now_ms);

        HoldSnapshot {
            car_id: self.car_id.clone(),
            status,
            expires_at_ms: (status == HoldStatus::Active).then_some(self.expires_at_ms),
            held_by_caller: caller.map(|room| self.is_owned_by(room)),
        }
    }
}

/// Read-only view handed to callers. Never carries the holder's room key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSnapshot {
    pub car_id: CarId,
    pub status: HoldStatus,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none", default)]
    pub expires_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub held_by_caller: Option<bool>,
}

impl HoldSnapshot {
    /// True when the caller's room holds an active hold.
    pub fn is_active_for_caller(&self) -> bool {
        self.status == HoldStatus::Active && self.held_by_caller == Some(true)
    }
}

/// Payload broadcast to every member of the holding room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldEvent {
    pub car_id: CarId,
    pub status: HoldStatus,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none", default)]
    pub expires_at_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomKey {
        RoomKey::derive("tab")
    }

    #[test]
    fn new_hold_expires_after_duration() {
        let h = Hold::new("car-1", &room(), 1_000, 600_000);

        assert_eq!(h.status, HoldStatus::Active);
        assert_eq!(h.expires_at_ms, 601_000);
        assert!(h.is_live(600_999));
        assert!(!h.is_live(601_000));
        assert!(h.is_overdue(601_000));
    }

    #[test]
    fn overdue_hold_reports_expired_without_deadline() {
        let h = Hold::new("car-1", &room(), 0, 10);
        let snap = h.snapshot(10, None);

        assert_eq!(snap.status, HoldStatus::Expired);
        assert_eq!(snap.expires_at_ms, None);
        assert_eq!(snap.held_by_caller, None);
    }

    #[test]
    fn snapshot_tells_caller_whether_they_hold_it() {
        let h = Hold::new("car-1", &room(), 0, 10);

        assert!(h.snapshot(5, Some(&room())).is_active_for_caller());
        let other = RoomKey::derive("other");
        assert!(!h.snapshot(5, Some(&other)).is_active_for_caller());
    }

    #[test]
    fn event_serializes_with_external_field_names() {
        let mut h = Hold::new("car-1", &room(), 0, 10);
        let json = serde_json::to_value(h.event()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "carId": "car-1", "status": "active", "expiresAt": 10 })
        );

        h.finish(HoldStatus::Released, 4);
        let json = serde_json::to_value(h.event()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "carId": "car-1", "status": "released" })
        );
    }

    #[test]
    fn extend_counts_renewals() {
        let mut h = Hold::new("car-1", &room(), 0, 10);
        h.extend(8, 10);

        assert_eq!(h.expires_at_ms, 18);
        assert_eq!(h.renewals, 1);
    }
}

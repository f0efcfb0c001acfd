//! Room fan-out of hold events.
//!
//! The manager publishes from inside a per-car critical section, so
//! `publish` must never block or do I/O. The in-process [`BroadcastHub`]
//! uses one `tokio::sync::broadcast` channel per room; transports (WebSocket,
//! SSE, ...) subscribe and forward.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::model::HoldEvent;
use crate::room_key::RoomKey;

pub trait RoomBroadcaster: Send + Sync {
    /// Deliver `event` to every current member of `room`. Non-blocking.
    fn publish(&self, room: &RoomKey, event: HoldEvent);
}

impl<T: RoomBroadcaster + ?Sized> RoomBroadcaster for Arc<T> {
    fn publish(&self, room: &RoomKey, event: HoldEvent) {
        (**self).publish(room, event)
    }
}

/// In-process per-room broadcast channels.
pub struct BroadcastHub {
    /// Buffered events per room before slow receivers start lagging.
    capacity: usize,
    rooms: Mutex<HashMap<RoomKey, broadcast::Sender<HoldEvent>>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Join a room. The receiver sees every event published after this call.
    pub fn subscribe(&self, room: &RoomKey) -> broadcast::Receiver<HoldEvent> {
        let mut rooms = self.rooms.lock();
        let tx = rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!(room = %room, members = tx.receiver_count() + 1, "room subscription added");
        tx.subscribe()
    }

    pub fn member_count(&self, room: &RoomKey) -> usize {
        self.rooms
            .lock()
            .get(room)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels whose members have all gone away. Returns how many.
    pub fn prune(&self) -> usize {
        let mut rooms = self.rooms.lock();
        let before = rooms.len();
        rooms.retain(|_, tx| tx.receiver_count() > 0);
        before - rooms.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl RoomBroadcaster for BroadcastHub {
    fn publish(&self, room: &RoomKey, event: HoldEvent) {
        let rooms = self.rooms.lock();

        match rooms.get(room) {
            Some(tx) => match tx.send(event) {
                Ok(n) => trace!(room = %room, delivered = n, "hold event broadcast"),
                Err(_) => trace!(room = %room, "room has no live members"),
            },
            None => trace!(room = %room, "no subscribers for room"),
        }
    }
}

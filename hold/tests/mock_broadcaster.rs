use parking_lot::Mutex;

use hold::broadcast::RoomBroadcaster;
use hold::{HoldEvent, HoldStatus, RoomKey};

/// Records every published event in order.
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub events: Mutex<Vec<(RoomKey, HoldEvent)>>,
}

impl RecordingBroadcaster {
    pub fn statuses_for(&self, room: &RoomKey) -> Vec<HoldStatus> {
        self.events
            .lock()
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, e)| e.status)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl RoomBroadcaster for RecordingBroadcaster {
    fn publish(&self, room: &RoomKey, event: HoldEvent) {
        self.events.lock().push((room.clone(), event));
    }
}

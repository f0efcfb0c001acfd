use async_trait::async_trait;
use hold::{Hold, RoomKey};
use serde::Serialize;

use crate::draft::BookingDraft;

/// A draft whose hold was converted; handed to the booking store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedBooking {
    /// Unique per hold; safe to use as an idempotency key.
    pub hold_id: String,
    pub room: RoomKey,
    pub converted_at_ms: u64,
    pub draft: BookingDraft,
}

impl SubmittedBooking {
    pub fn new(hold: &Hold, draft: BookingDraft) -> Self {
        Self {
            hold_id: hold.hold_id.to_string(),
            room: hold.room.clone(),
            converted_at_ms: hold.ended_at_ms.unwrap_or(hold.created_at_ms),
            draft,
        }
    }
}

/// Durable booking persistence lives outside this service.
#[async_trait]
pub trait BookingRecorder: Send + Sync {
    async fn record_booking(&self, booking: &SubmittedBooking) -> anyhow::Result<()>;
}

//! JSON wire messages.
//!
//! Client → server: `{"op": "...", "requestId"?, "carId"?, "roomKey"?, "clientId"?}`
//! Server → client: tagged by `"type"`; `event` frames are pushed unprompted.

use hold::{HoldEvent, HoldSnapshot, RoomKey};
use serde::{Deserialize, Serialize};

/// Customer-facing operations. Conversion only happens through the booking
/// flow's submit, and reopening a converted car belongs to the booking
/// lifecycle; neither is reachable from a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    Claim,
    Renew,
    Release,
    Inspect,
    Subscribe,
    DeriveRoomKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub op: Op,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub car_id: Option<String>,
    /// Another room to watch. Only `subscribe` and `inspect` accept it.
    #[serde(default)]
    pub room_key: Option<String>,
    /// Input for `deriveRoomKey`.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Wire error tags. Hold errors reuse [`hold::HoldError::kind`].
pub mod error_kind {
    pub const VALIDATION_FAILED: &str = "validationFailed";
    pub const BAD_REQUEST: &str = "badRequest";
    pub const FORBIDDEN: &str = "forbidden";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Hold {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(flatten)]
        snapshot: HoldSnapshot,
    },
    Ok {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(rename = "carId", skip_serializing_if = "Option::is_none")]
        car_id: Option<String>,
        #[serde(rename = "roomKey", skip_serializing_if = "Option::is_none")]
        room_key: Option<RoomKey>,
    },
    RoomKey {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(rename = "roomKey")]
        room_key: RoomKey,
    },
    Error {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: &'static str,
        reason: String,
    },
    Event {
        #[serde(flatten)]
        event: HoldEvent,
    },
}

impl ServerMessage {
    pub fn error(request_id: Option<String>, kind: &'static str, reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            request_id,
            error: kind,
            reason: reason.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hold::HoldStatus;
    use serde_json::json;

    #[test]
    fn parses_minimal_and_full_requests() {
        let req: ClientRequest = serde_json::from_str(r#"{"op":"inspect","carId":"car-1"}"#).unwrap();
        assert_eq!(req.op, Op::Inspect);
        assert_eq!(req.car_id.as_deref(), Some("car-1"));
        assert_eq!(req.request_id, None);

        let req: ClientRequest =
            serde_json::from_str(r#"{"op":"deriveRoomKey","clientId":"ua","requestId":"7"}"#).unwrap();
        assert_eq!(req.op, Op::DeriveRoomKey);
        assert_eq!(req.client_id.as_deref(), Some("ua"));

        assert!(serde_json::from_str::<ClientRequest>(r#"{"op":"steal"}"#).is_err());
        assert!(serde_json::from_str::<ClientRequest>(r#"{"op":"convert","carId":"car-1"}"#).is_err());
        assert!(serde_json::from_str::<ClientRequest>(r#"{"op":"reopen","carId":"car-1"}"#).is_err());
    }

    #[test]
    fn hold_reply_flattens_snapshot() {
        let msg = ServerMessage::Hold {
            request_id: Some("1".into()),
            snapshot: HoldSnapshot {
                car_id: "car-1".into(),
                status: HoldStatus::Active,
                expires_at_ms: Some(42),
                held_by_caller: Some(true),
            },
        };

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "hold",
                "requestId": "1",
                "carId": "car-1",
                "status": "active",
                "expiresAt": 42,
                "heldByCaller": true
            })
        );
    }

    #[test]
    fn event_and_error_frames() {
        let event = ServerMessage::Event {
            event: HoldEvent {
                car_id: "car-1".into(),
                status: HoldStatus::Expired,
                expires_at_ms: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "event", "carId": "car-1", "status": "expired"})
        );

        let err = ServerMessage::error(None, error_kind::BAD_REQUEST, "not json");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"type": "error", "error": "badRequest", "reason": "not json"})
        );
    }
}

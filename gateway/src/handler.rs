//! Request dispatch, independent of the socket.
//!
//! A [`Session`] is one connection's state: its own room and the rooms it
//! listens to. [`HoldService::handle`] turns one text frame into one reply and
//! records any new subscriptions for the transport to wire up.

use std::collections::HashSet;
use std::sync::Arc;

use common::logger::{TraceId, child_span};
use common::time::Clock;
use hold::broadcast::BroadcastHub;
use hold::{Hold, HoldError, HoldEvent, HoldManager, RoomKey};
use tokio::sync::broadcast;
use tracing::{Instrument, debug, instrument, warn};

use crate::protocol::{ClientRequest, Op, ServerMessage, error_kind};

pub struct Session {
    trace_id: TraceId,
    room: RoomKey,
    subscribed: HashSet<RoomKey>,
    pending: Vec<RoomKey>,
}

impl Session {
    /// A new connection is always a member of its own room.
    pub fn new(room: RoomKey) -> Self {
        let mut session = Self {
            trace_id: TraceId::new(),
            room: room.clone(),
            subscribed: HashSet::new(),
            pending: Vec::new(),
        };
        session.subscribe(room);
        session
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn room(&self) -> &RoomKey {
        &self.room
    }

    pub fn is_subscribed(&self, room: &RoomKey) -> bool {
        self.subscribed.contains(room)
    }

    /// Rooms joined since the last call.
    pub fn take_pending(&mut self) -> Vec<RoomKey> {
        std::mem::take(&mut self.pending)
    }

    fn subscribe(&mut self, room: RoomKey) -> bool {
        if !self.subscribed.insert(room.clone()) {
            return false;
        }
        self.pending.push(room);
        true
    }
}

/// Error reply before it is tagged with the request id.
struct Invalid {
    kind: &'static str,
    reason: String,
}

impl Invalid {
    fn validation(reason: impl Into<String>) -> Self {
        Self {
            kind: error_kind::VALIDATION_FAILED,
            reason: reason.into(),
        }
    }
}

impl From<HoldError> for Invalid {
    fn from(e: HoldError) -> Self {
        Self {
            kind: e.kind(),
            reason: e.to_string(),
        }
    }
}

pub struct HoldService {
    holds: Arc<HoldManager<BroadcastHub>>,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
}

impl HoldService {
    pub fn new(
        holds: Arc<HoldManager<BroadcastHub>>,
        hub: Arc<BroadcastHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { holds, hub, clock }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn subscribe(&self, room: &RoomKey) -> broadcast::Receiver<HoldEvent> {
        self.hub.subscribe(room)
    }

    /// In-process hook for the booking lifecycle once a booked car is free
    /// again. Not exposed on the customer socket.
    pub async fn reopen(&self, car_id: &str) -> Result<Hold, HoldError> {
        self.holds.reopen(car_id).await
    }

    /// Handle one text frame. Always produces exactly one reply.
    #[instrument(skip(self, session, raw), target = "gateway", fields(room = %session.room()))]
    pub async fn handle(&self, session: &mut Session, raw: &str) -> ServerMessage {
        let req: ClientRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return ServerMessage::error(None, error_kind::BAD_REQUEST, format!("invalid request: {e}"));
            }
        };

        debug!(op = ?req.op, car_id = ?req.car_id, "request received");
        let request_id = req.request_id.clone();

        let span = child_span("dispatch");
        if let Some(car_id) = req.car_id.as_deref() {
            span.record("car_id", car_id);
        }

        match self.dispatch(session, req).instrument(span).await {
            Ok(reply) => reply,
            Err(Invalid { kind, reason }) => ServerMessage::error(request_id, kind, reason),
        }
    }

    async fn dispatch(&self, session: &mut Session, req: ClientRequest) -> Result<ServerMessage, Invalid> {
        let room = acting_room(session, &req)?;
        let request_id = req.request_id.clone();

        let reply = match req.op {
            Op::Claim => {
                let hold = self.holds.claim(require_car(&req)?, &room).await?;
                self.hold_reply(request_id, &hold, Some(&room))
            }
            Op::Renew => {
                let hold = self.holds.renew(require_car(&req)?, &room).await?;
                self.hold_reply(request_id, &hold, Some(&room))
            }
            Op::Release => {
                let car_id = require_car(&req)?;
                self.holds.release(car_id, &room).await?;
                ServerMessage::Ok {
                    request_id,
                    car_id: Some(car_id.to_string()),
                    room_key: None,
                }
            }
            Op::Inspect => {
                let car_id = require_car(&req)?;
                match self.holds.inspect_for(car_id, &room).await {
                    Some(snapshot) => ServerMessage::Hold {
                        request_id,
                        snapshot,
                    },
                    // no hold: the car is free
                    None => ServerMessage::Ok {
                        request_id,
                        car_id: Some(car_id.to_string()),
                        room_key: None,
                    },
                }
            }
            Op::Subscribe => {
                if !session.subscribe(room.clone()) {
                    debug!(target_room = %room, "already subscribed");
                }
                ServerMessage::Ok {
                    request_id,
                    car_id: None,
                    room_key: Some(room),
                }
            }
            Op::DeriveRoomKey => {
                let client_id = req
                    .client_id
                    .as_deref()
                    .ok_or_else(|| Invalid::validation("clientId is required"))?;
                ServerMessage::RoomKey {
                    request_id,
                    room_key: RoomKey::derive(client_id),
                }
            }
        };

        Ok(reply)
    }

    fn hold_reply(&self, request_id: Option<String>, hold: &Hold, caller: Option<&RoomKey>) -> ServerMessage {
        ServerMessage::Hold {
            request_id,
            snapshot: hold.snapshot(self.clock.now_ms(), caller),
        }
    }
}

/// The connection's own room, unless a read-only op names another one.
fn acting_room(session: &Session, req: &ClientRequest) -> Result<RoomKey, Invalid> {
    let Some(raw) = req.room_key.as_deref() else {
        return Ok(session.room().clone());
    };

    if !matches!(req.op, Op::Subscribe | Op::Inspect) {
        warn!(op = ?req.op, "roomKey rejected on a mutating op");
        return Err(Invalid {
            kind: error_kind::FORBIDDEN,
            reason: "roomKey is only accepted by subscribe and inspect".to_string(),
        });
    }

    RoomKey::parse(raw).map_err(|e| Invalid::validation(e.to_string()))
}

fn require_car(req: &ClientRequest) -> Result<&str, Invalid> {
    match req.car_id.as_deref() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(Invalid::validation("carId is required")),
    }
}

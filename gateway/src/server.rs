//! WebSocket transport.
//!
//! One task per connection. The handshake captures the `User-Agent`, which
//! decides the connection's own room. Room events reach the socket through a
//! forwarder task per subscribed room feeding a single outbound queue, so the
//! socket has exactly one writer.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use hold::{HoldEvent, RoomKey};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{Instrument, debug, error, info, warn};

use common::logger::root_span;

use crate::handler::{HoldService, Session};
use crate::protocol::{ServerMessage, error_kind};

const OUTBOUND_QUEUE: usize = 64;

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, service: Arc<HoldService>) -> anyhow::Result<()> {
    let local = listener.local_addr().context("listener has no local address")?;
    info!(addr = %local, "hold gateway listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                // usually fd exhaustion; keep serving the connections we have
                error!(error = ?e, "accept failed");
                continue;
            }
        };

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, service).await {
                warn!(peer = %peer, error = ?e, "connection ended with error");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<HoldService>,
) -> anyhow::Result<()> {
    let mut user_agent = String::new();
    let capture_ua = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if let Some(ua) = req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()) {
            user_agent = ua.to_string();
        }
        Ok(resp)
    };

    let ws = accept_hdr_async(stream, capture_ua)
        .await
        .context("websocket handshake failed")?;

    let mut session = Session::new(RoomKey::derive(&user_agent));
    let span = root_span("ws_connection", session.trace_id());
    span.record("room", tracing::field::display(session.room()));

    let result = run_session(ws, &mut session, &service, peer)
        .instrument(span)
        .await;

    let pruned = service.hub().prune();
    if pruned > 0 {
        debug!(pruned, "empty rooms dropped");
    }

    result
}

async fn run_session(
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    session: &mut Session,
    service: &HoldService,
    peer: SocketAddr,
) -> anyhow::Result<()> {
    info!(peer = %peer, "client connected");

    let (mut write, mut read) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

    // dropping the set aborts every forwarder
    let mut forwarders = JoinSet::new();
    for room in session.take_pending() {
        spawn_forwarder(&mut forwarders, room.clone(), service.subscribe(&room), out_tx.clone());
    }

    loop {
        tokio::select! {
            Some(outbound) = out_rx.recv() => {
                send(&mut write, &outbound).await?;
            }

            incoming = read.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = ?e, "websocket read failed");
                        break;
                    }
                    None => break,
                };

                let reply = match msg {
                    Message::Text(text) => service.handle(session, text.as_str()).await,
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                    _ => ServerMessage::error(None, error_kind::BAD_REQUEST, "expected a JSON text frame"),
                };

                for room in session.take_pending() {
                    spawn_forwarder(&mut forwarders, room.clone(), service.subscribe(&room), out_tx.clone());
                }

                send(&mut write, &reply).await?;
            }
        }
    }

    forwarders.abort_all();
    info!(peer = %peer, "client disconnected");
    Ok(())
}

fn spawn_forwarder(
    set: &mut JoinSet<()>,
    room: RoomKey,
    mut events: broadcast::Receiver<HoldEvent>,
    out: mpsc::Sender<ServerMessage>,
) {
    set.spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if out.send(ServerMessage::Event { event }).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(room = %room, skipped, "connection lagging; room events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn send<S>(write: &mut S, msg: &ServerMessage) -> anyhow::Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = msg.to_json().context("encode server message")?;
    write
        .send(Message::Text(text.into()))
        .await
        .context("websocket send failed")?;
    Ok(())
}

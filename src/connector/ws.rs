//! Axum websocket upgrade and per-connection read/write loop, built on the
//! same upgrade-handler shape as an ordinary axum `server::routes` module,
//! but carrying the length-prefixed `Packet`/`Message` wire framing (see
//! `protocol::frame`) instead of raw JSON-over-websocket.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::persistence::AuthVerifier;
use crate::protocol::frame::{Packet, PacketType};
use crate::protocol::message::{HandshakeRequest, HandshakeResponse, Message};
use crate::store::RouteStore;

use super::dispatch::Dispatcher;
use super::error::GatewayError;
use super::rate_limit::ConnectionAdmission;
use super::registry::{ClientHandle, SharedRegistry};
use super::session::{OutboundFrame, Session};
use super::worker_pool::DispatchWorkerPool;

const LOG_TARGET: &str = "connector::ws";
const OUTBOUND_CAPACITY: usize = 256;
const IDLE_TIMEOUT: Duration = Duration::from_secs(3 * HEARTBEAT_MISS_TOLERANCE);
const HEARTBEAT_MISS_TOLERANCE: u64 = 10;

#[derive(Clone)]
pub struct ConnectorContext {
    pub node_id: String,
    pub registry: SharedRegistry,
    pub admission: Arc<ConnectionAdmission>,
    pub auth: Arc<dyn AuthVerifier>,
    pub route_store: RouteStore,
    pub dispatcher: Arc<Dispatcher>,
    pub dispatch_pool: Arc<DispatchWorkerPool>,
}

pub async fn ws_upgrade(
    State(ctx): State<Arc<ConnectorContext>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let permit = match ctx.admission.try_admit() {
        Ok(permit) => permit,
        Err(err) => {
            warn!(target: LOG_TARGET, error = %err, "connection refused at admission");
            return axum::http::StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    };
    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        handle_connection(socket, ctx).await;
    })
    .into_response()
}

async fn handle_connection(socket: WebSocket, ctx: Arc<ConnectorContext>) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_CAPACITY);
    let session = Arc::new(Session::new(connection_id.clone(), outbound_tx));

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let is_kick = matches!(frame, OutboundFrame::Kick);
            let Some(packet) = encode_frame(frame) else { break };
            let Ok(bytes) = packet.encode() else { break };
            if sink.send(WsMessage::Binary(bytes.to_vec())).await.is_err() || is_kick {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        let next = tokio::time::timeout(IDLE_TIMEOUT, stream.next()).await;
        let bytes = match next {
            Ok(Some(Ok(WsMessage::Binary(bytes)))) => bytes,
            Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(err))) => {
                warn!(target: LOG_TARGET, connection_id, error = %err, "websocket error");
                break;
            }
            Err(_) => {
                warn!(target: LOG_TARGET, connection_id, "idle timeout, dropping connection");
                break;
            }
        };

        let packet = match Packet::decode_one(&bytes) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(target: LOG_TARGET, connection_id, error = %err, "malformed frame");
                break;
            }
        };

        // Enqueued onto this connection's dispatch worker rather than run
        // here directly; `connection_id` is the
        // FNV key so every frame from this socket lands on the same
        // worker and keeps its order.
        if ctx.dispatch_pool.dispatch(&connection_id, packet, &session, &ctx).await.is_err() {
            let _ = session.outbound.send(OutboundFrame::Kick).await;
            break;
        }
    }

    drop_session(&session, &ctx);
    let _ = writer.await;
}

fn drop_session(session: &Session, ctx: &ConnectorContext) {
    if let Some(user_id) = session.user_id() {
        ctx.registry.unregister(&user_id);
        info!(target: LOG_TARGET, user_id, "connection closed");
    }
}

/// Processes one decoded packet against a session's current phase. Called
/// either inline from the read loop's own task (pre-dispatch-pool
/// behavior, kept for tests) or from a [`DispatchWorkerPool`] worker.
pub(crate) async fn handle_packet(packet: Packet, session: &Arc<Session>, ctx: &Arc<ConnectorContext>) -> Result<(), ()> {
    match packet.kind {
        PacketType::Handshake => {
            let _request: HandshakeRequest = match serde_json::from_slice(&packet.body) {
                Ok(req) => req,
                Err(err) => {
                    warn!(target: LOG_TARGET, error = %err, "malformed handshake");
                    return Err(());
                }
            };
            session.mark_handshaken();
            let _ = session.outbound.send(OutboundFrame::HandshakeAck).await;
            Ok(())
        }
        PacketType::Heartbeat => {
            let _ = session.outbound.send(OutboundFrame::Heartbeat).await;
            Ok(())
        }
        PacketType::Data => {
            if session.phase() == super::session::SessionPhase::AwaitingHandshake {
                warn!(target: LOG_TARGET, "data frame before handshake");
                return Err(());
            }
            let message = match Message::from_json_bytes(&packet.body) {
                Ok(message) => message,
                Err(err) => {
                    warn!(target: LOG_TARGET, error = %err, "malformed data packet");
                    return Err(());
                }
            };
            handle_data_message(message, session, ctx).await
        }
        PacketType::Kick | PacketType::HandshakeAck => Err(()),
    }
}

async fn handle_data_message(message: Message, session: &Arc<Session>, ctx: &Arc<ConnectorContext>) -> Result<(), ()> {
    if session.user_id().is_none() {
        return authenticate(message, session, ctx).await;
    }

    let user_id = session.user_id().expect("checked above");
    let request_id = message.id;
    let route = message.route.clone();
    match ctx.dispatcher.handle(&user_id, message).await {
        Ok(Some(reply)) => {
            let _ = session.send(reply).await;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            warn!(target: LOG_TARGET, user_id, error = %err, "dispatch failed");
            if let Some(id) = request_id {
                let _ = session.send(Message::error_response(id, route, err.to_string())).await;
            }
            Ok(())
        }
    }
}

async fn authenticate(message: Message, session: &Arc<Session>, ctx: &Arc<ConnectorContext>) -> Result<(), ()> {
    if message.route_prefix() != "auth" {
        warn!(target: LOG_TARGET, "first message on a connection must authenticate");
        return Err(());
    }
    let Some(token) = message.data.get("token").and_then(|v| v.as_str()) else {
        return Err(());
    };
    let user_id = match ctx.auth.verify(token).await {
        Ok(user_id) => user_id,
        Err(err) => {
            warn!(target: LOG_TARGET, error = %err, "auth failed");
            if let Some(id) = message.id {
                let _ = session.send(Message::error_response(id, message.route, err.to_string())).await;
            }
            return Err(());
        }
    };

    session.bind(user_id.clone());
    ctx.registry.register(user_id.clone(), ClientHandle { outbound: session.outbound.clone() });
    if let Err(err) = ctx.route_store.set_connector_node(&user_id, &ctx.node_id).await {
        warn!(target: LOG_TARGET, user_id, error = %err, "failed to persist connector route");
    }

    if let Some(id) = message.id {
        let _ = session
            .send(Message::response(id, message.route, serde_json::json!({ "userId": user_id })))
            .await;
    }
    Ok(())
}

fn encode_frame(frame: OutboundFrame) -> Option<Packet> {
    match frame {
        OutboundFrame::Data(message) => {
            let body = message.to_json_bytes().ok()?;
            Packet::new(PacketType::Data, body).ok()
        }
        OutboundFrame::HandshakeAck => {
            let body = serde_json::to_vec(&HandshakeResponse::ok()).ok()?;
            Packet::new(PacketType::HandshakeAck, body).ok()
        }
        OutboundFrame::Heartbeat => Packet::new(PacketType::Heartbeat, Vec::new()).ok(),
        OutboundFrame::Kick => Packet::new(PacketType::Kick, Vec::new()).ok(),
    }
}

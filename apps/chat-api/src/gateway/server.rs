//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::auth::tokens;
use crate::models::conversation::Conversation;
use crate::models::user::UserInfo;
use crate::AppState;

use super::events::{ClientEvent, ServerEvent};
use super::presence;
use super::rooms::room_key;
use super::session::ConnHandle;

/// Close codes (4000-range for application-level).
const CLOSE_PROTOCOL_ERROR: u16 = 4000;
const CLOSE_UNKNOWN_EVENT: u16 = 4001;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_TIMEOUT: u16 = 4009;

/// Heartbeat interval announced to clients in `ready` (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// Timeout for receiving `identify` after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: the first frame must be `identify`, within the timeout. The
    // token is part of the handshake — it cannot be supplied later.
    let token = match time::timeout(
        Duration::from_secs(IDENTIFY_TIMEOUT_SECS),
        read_identify(&mut ws_tx, &mut ws_rx),
    )
    .await
    {
        Ok(Ok(token)) => token,
        Ok(Err(())) => return,
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    // Step 2: validate the credential. A rejected connection never reaches
    // any room operation, and the close reason distinguishes a missing token
    // from an invalid one.
    let identity = match tokens::authenticate(token.as_deref(), &state.config.jwt_secret) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(reason = err.reason(), "gateway handshake rejected");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, err.reason()).await;
            return;
        }
    };

    // Step 3: register the connection and confirm with `ready`.
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let conn = ConnHandle::new(identity, tx);

    tracing::info!(
        conn_id = conn.conn_id,
        user_id = conn.identity.user_id,
        username = %conn.identity.username,
        "gateway connection established"
    );

    let ready = ServerEvent::Ready {
        user: UserInfo {
            id: conn.identity.user_id,
            username: conn.identity.username.clone(),
        },
        heartbeat_interval: HEARTBEAT_INTERVAL_MS,
    };
    if send_event(&mut ws_tx, &ready).await.is_err() {
        return;
    }

    run_session(&state, &conn, ws_tx, ws_rx, &mut outbound).await;

    // The loop has exited: no further joins can come from this connection,
    // so the purge below is final. Called exactly once per connection.
    state.rooms.purge(conn.conn_id);

    tracing::info!(
        conn_id = conn.conn_id,
        user_id = conn.identity.user_id,
        "gateway connection closed"
    );
}

/// Read frames until the client's `identify` arrives. Any other event first
/// is a protocol violation and closes the connection.
async fn read_identify(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    ws_rx: &mut SplitStream<WebSocket>,
) -> Result<Option<String>, ()> {
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(?e, "ws read error during handshake");
                return Err(());
            }
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return Err(()),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(ev) => ev,
            Err(_) => {
                let _ = send_close(ws_tx, CLOSE_PROTOCOL_ERROR, "Invalid JSON").await;
                return Err(());
            }
        };

        return match event {
            ClientEvent::Identify { token } => Ok(token),
            _ => {
                let _ = send_close(ws_tx, CLOSE_NOT_AUTHENTICATED, "Expected identify").await;
                Err(())
            }
        };
    }
    Err(())
}

/// Main session loop: dispatch inbound events, drain the outbound queue,
/// enforce the heartbeat deadline.
async fn run_session(
    state: &AppState,
    conn: &ConnHandle,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    outbound: &mut mpsc::UnboundedReceiver<ServerEvent>,
) {
    // Client must heartbeat within 1.5x the interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(ev) => ev,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_EVENT, "Unrecognized event").await;
                                break;
                            }
                        };

                        match event {
                            ClientEvent::Identify { .. } => {
                                // The credential is fixed at connection time.
                                let _ = send_close(&mut ws_tx, CLOSE_PROTOCOL_ERROR, "Already identified").await;
                                break;
                            }
                            ClientEvent::Heartbeat => {
                                got_heartbeat = true;
                                if send_event(&mut ws_tx, &ServerEvent::HeartbeatAck).await.is_err() {
                                    break;
                                }
                            }
                            ClientEvent::Join { conversation_id } => {
                                handle_join(state, conn, conversation_id).await;
                            }
                            ClientEvent::Leave { conversation_id } => {
                                state.rooms.leave(&room_key(conversation_id), conn.conn_id);
                                tracing::debug!(
                                    conn_id = conn.conn_id,
                                    conversation_id,
                                    "left room"
                                );
                            }
                            ClientEvent::Typing { conversation_id } => {
                                presence::signal_typing(&state.rooms, conversation_id, conn);
                            }
                            ClientEvent::StopTyping { conversation_id } => {
                                presence::signal_stop_typing(&state.rooms, conversation_id, conn);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, conn_id = conn.conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // An event queued for this connection (room broadcast or fan-out).
            event = outbound.recv() => {
                match event {
                    Some(ev) => {
                        if send_event(&mut ws_tx, &ev).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Heartbeat deadline check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        conn_id = conn.conn_id,
                        "heartbeat timeout — closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Authorize and apply a room join. Rejection is per-operation — the
/// connection stays alive and the member sets of other users are untouched.
async fn handle_join(state: &AppState, conn: &ConnHandle, conversation_id: i64) {
    match Conversation::is_member(&state.db, conversation_id, conn.identity.user_id).await {
        Ok(true) => {
            state.rooms.join(&room_key(conversation_id), conn);
            tracing::debug!(conn_id = conn.conn_id, conversation_id, "joined room");
        }
        Ok(false) => {
            conn.send(ServerEvent::Error {
                code: "FORBIDDEN",
                message: format!("Not a participant of conversation {conversation_id}"),
            });
        }
        Err(err) => {
            tracing::error!(?err, conversation_id, "join membership check failed");
            conn.send(ServerEvent::Error {
                code: "INTERNAL_ERROR",
                message: "Could not verify conversation membership".to_string(),
            });
        }
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}

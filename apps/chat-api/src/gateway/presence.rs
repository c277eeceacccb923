//! Ephemeral typing-indicator relay.
//!
//! Nothing here is stored: each signal is fanned out to the room minus the
//! sending connection and forgotten. Clients own the debounce and
//! stop-typing cadence; the server never expires a typing state on its own,
//! so a connection that drops before `stopTyping` simply goes silent.

use super::events::ServerEvent;
use super::rooms::{room_key, RoomRegistry};
use super::session::ConnHandle;

pub fn signal_typing(registry: &RoomRegistry, conversation_id: i64, conn: &ConnHandle) {
    let event = ServerEvent::UserTyping {
        user_id: conn.identity.user_id,
        username: conn.identity.username.clone(),
    };
    registry.broadcast(&room_key(conversation_id), event, Some(conn.conn_id));
}

pub fn signal_stop_typing(registry: &RoomRegistry, conversation_id: i64, conn: &ConnHandle) {
    let event = ServerEvent::UserStoppedTyping {
        user_id: conn.identity.user_id,
    };
    registry.broadcast(&room_key(conversation_id), event, Some(conn.conn_id));
}

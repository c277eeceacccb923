//! Room membership registry — the only shared mutable state in the gateway.
//!
//! A room is the set of live connections subscribed to one conversation.
//! Each room's member map sits behind its own `parking_lot::Mutex`, so
//! join/leave/broadcast/purge are mutually exclusive per room: a broadcast
//! snapshot fully includes or fully excludes a transitioning member, and two
//! broadcasts against the same room reach every member in the same order.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::events::ServerEvent;
use super::session::{ConnHandle, ConnId, OutboundTx};

/// Derive the room key for a conversation. Join/leave and message fan-out
/// both go through this, so they always target the same room.
pub fn room_key(conversation_id: i64) -> String {
    format!("conv_{conversation_id}")
}

pub struct RoomRegistry {
    /// Forward map: room key to the connections currently in the room.
    rooms: DashMap<String, Mutex<HashMap<ConnId, OutboundTx>>>,
    /// Reverse index: the rooms each connection has joined. Updated by the
    /// same operations that touch `rooms`, consumed by `purge`.
    joined: DashMap<ConnId, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            joined: DashMap::new(),
        }
    }

    /// Add a connection to a room. Idempotent — re-joining is a no-op.
    pub fn join(&self, room: &str, conn: &ConnHandle) {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| Mutex::new(HashMap::new()))
            .lock()
            .insert(conn.conn_id, conn.tx.clone());

        self.joined
            .entry(conn.conn_id)
            .or_default()
            .insert(room.to_string());
    }

    /// Remove a connection from a room. No-op when it is not a member.
    pub fn leave(&self, room: &str, conn_id: ConnId) {
        if let Some(members) = self.rooms.get(room) {
            members.lock().remove(&conn_id);
        }
        self.rooms.remove_if(room, |_, members| members.lock().is_empty());

        if let Some(mut set) = self.joined.get_mut(&conn_id) {
            set.remove(room);
        }
    }

    /// Queue `event` to every current member of `room`, except `exclude`.
    /// Returns the number of delivery attempts. A send to a connection that
    /// died mid-broadcast is dropped, not retried.
    pub fn broadcast(&self, room: &str, event: ServerEvent, exclude: Option<ConnId>) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        let members = members.lock();

        let mut delivered = 0;
        for (conn_id, tx) in members.iter() {
            if Some(*conn_id) == exclude {
                continue;
            }
            let _ = tx.send(event.clone());
            delivered += 1;
        }
        delivered
    }

    /// Remove a connection from every room it joined. Called exactly once,
    /// when the connection's task ends; a purged connection never appears in
    /// a later broadcast snapshot.
    pub fn purge(&self, conn_id: ConnId) {
        let Some((_, joined_rooms)) = self.joined.remove(&conn_id) else {
            return;
        };

        for room in joined_rooms {
            if let Some(members) = self.rooms.get(&room) {
                members.lock().remove(&conn_id);
            }
            self.rooms
                .remove_if(&room, |_, members| members.lock().is_empty());
        }
    }

    /// Current member count of a room. Unknown rooms are empty.
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.lock().len()).unwrap_or(0)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

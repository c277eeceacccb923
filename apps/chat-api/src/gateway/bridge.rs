//! Fan-out of durably persisted messages to live room members.

use std::sync::Arc;

use super::events::ServerEvent;
use super::rooms::{room_key, RoomRegistry};
use crate::models::message::PersistedMessage;

/// Links the synchronous persistence path to the realtime push path.
///
/// `deliver` must only be invoked after the message insert has committed.
/// The broadcast is best-effort and non-blocking: an empty room or a dead
/// connection never feeds back into the already-committed write.
#[derive(Clone)]
pub struct DeliveryBridge {
    registry: Arc<RoomRegistry>,
}

impl DeliveryBridge {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Push a persisted message to every current member of its conversation's
    /// room. No exclusion — the sender's own connections receive the
    /// canonical record too and reconcile their optimistic copy by id.
    pub fn deliver(&self, message: PersistedMessage) {
        let room = room_key(message.conversation_id);
        let delivered = self
            .registry
            .broadcast(&room, ServerEvent::NewMessage(message), None);

        if delivered == 0 {
            tracing::debug!(%room, "no live members for message fan-out");
        } else {
            tracing::debug!(%room, delivered, "message fanned out");
        }
    }
}

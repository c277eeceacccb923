//! Per-connection state.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::auth::tokens::Identity;

use super::events::ServerEvent;

/// Process-unique connection identifier. Two concurrent connections of the
/// same user get distinct ids — room membership is per connection.
pub type ConnId = u64;

/// Outbound event queue for one connection. Sends never block; the
/// connection's own task drains the queue onto the socket.
pub type OutboundTx = mpsc::UnboundedSender<ServerEvent>;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for a single authenticated WebSocket connection. The identity is
/// fixed at handshake time and never re-derived.
#[derive(Clone)]
pub struct ConnHandle {
    pub conn_id: ConnId,
    pub identity: Identity,
    pub tx: OutboundTx,
}

impl ConnHandle {
    pub fn new(identity: Identity, tx: OutboundTx) -> Self {
        Self {
            conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            identity,
            tx,
        }
    }

    /// Queue an event to this connection. A send to a connection whose task
    /// has already exited is dropped — its membership is being purged.
    pub fn send(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}

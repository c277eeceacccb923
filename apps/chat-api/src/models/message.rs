use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::messages;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
}

/// A message as durably stored, hydrated with the sender's username.
///
/// This is the canonical record: the send route returns it and the gateway
/// pushes it verbatim to room members, so clients can reconcile optimistic
/// state purely by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PersistedMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl PersistedMessage {
    pub fn from_row(message: Message, sender_username: String) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_username,
            content: message.content,
            sent_at: message.sent_at,
        }
    }
}

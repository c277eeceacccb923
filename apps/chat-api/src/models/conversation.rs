use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::pool::DbPool;
use crate::db::schema::conversations;
use crate::error::ApiError;

/// A 1:1 conversation between two users. Participants are stored normalized
/// (`user1_id < user2_id`) so each pair maps to exactly one row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub user1_id: i64,
    pub user2_id: i64,
}

/// One entry in a user's conversation list: the other participant plus a
/// preview of the latest message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationSummary {
    pub id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Normalize a participant pair to storage order.
    pub fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Whether `user_id` participates in `conversation_id`.
    ///
    /// Authorizes both message sends and gateway room joins, so the two
    /// paths can never disagree about membership.
    pub async fn is_member(
        db: &DbPool,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<bool, ApiError> {
        let mut conn = db.get().await?;

        let matches: i64 = conversations::table
            .filter(conversations::id.eq(conversation_id))
            .filter(
                conversations::user1_id
                    .eq(user_id)
                    .or(conversations::user2_id.eq(user_id)),
            )
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(matches > 0)
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_normalizes() {
        assert_eq!(Conversation::ordered_pair(7, 3), (3, 7));
        assert_eq!(Conversation::ordered_pair(3, 7), (3, 7));
    }

    #[test]
    fn other_participant_picks_the_peer() {
        let conv = Conversation {
            id: 1,
            user1_id: 3,
            user2_id: 7,
            created_at: Utc::now(),
        };
        assert_eq!(conv.other_participant(3), 7);
        assert_eq!(conv.other_participant(7), 3);
    }
}

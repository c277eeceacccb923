//! Conversation endpoints: find-or-create, list, and message history.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{conversations, messages, users};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::conversation::{Conversation, ConversationSummary, NewConversation};
use crate::models::message::{Message, PersistedMessage};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(list_messages),
        )
}

// ---------------------------------------------------------------------------
// POST /api/v1/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    /// Username of the other participant.
    pub username: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = Conversation),
        (status = 200, description = "Conversation already existed", body = Conversation),
        (status = 400, description = "Invalid target", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn create_conversation(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }

    let mut conn = state.db.get().await?;

    let target_id: i64 = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if target_id == user_id {
        return Err(ApiError::bad_request(
            "Cannot start a conversation with yourself",
        ));
    }

    let (user1_id, user2_id) = Conversation::ordered_pair(user_id, target_id);

    if let Some(existing) = conversations::table
        .filter(conversations::user1_id.eq(user1_id))
        .filter(conversations::user2_id.eq(user2_id))
        .select(Conversation::as_select())
        .first(&mut conn)
        .await
        .optional()?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let created: Conversation = diesel::insert_into(conversations::table)
        .values(&NewConversation { user1_id, user2_id })
        .returning(Conversation::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::conflict("Conversation already exists"),
            other => ApiError::from(other),
        })?;

    tracing::info!(
        conversation_id = created.id,
        user1_id,
        user2_id,
        "conversation created"
    );

    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Conversations",
    responses(
        (status = 200, description = "The caller's conversations, most recent first", body = [ConversationSummary]),
        (status = 401, description = "Missing or invalid token", body = ApiErrorBody),
    ),
)]
pub async fn list_conversations(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let mut conn = state.db.get().await?;

    let convs: Vec<Conversation> = conversations::table
        .filter(
            conversations::user1_id
                .eq(user_id)
                .or(conversations::user2_id.eq(user_id)),
        )
        .select(Conversation::as_select())
        .load(&mut conn)
        .await?;

    if convs.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let other_ids: Vec<i64> = convs.iter().map(|c| c.other_participant(user_id)).collect();
    let usernames: HashMap<i64, String> = users::table
        .filter(users::id.eq_any(&other_ids))
        .select((users::id, users::username))
        .load::<(i64, String)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    // Latest message per conversation in one pass.
    let conv_ids: Vec<i64> = convs.iter().map(|c| c.id).collect();
    let latest: HashMap<i64, Message> = messages::table
        .filter(messages::conversation_id.eq_any(&conv_ids))
        .distinct_on(messages::conversation_id)
        .order((
            messages::conversation_id.asc(),
            messages::sent_at.desc(),
            messages::id.desc(),
        ))
        .select(Message::as_select())
        .load::<Message>(&mut conn)
        .await?
        .into_iter()
        .map(|m| (m.conversation_id, m))
        .collect();

    let mut summaries: Vec<ConversationSummary> = convs
        .into_iter()
        .map(|c| {
            let other_user_id = c.other_participant(user_id);
            let last = latest.get(&c.id);
            ConversationSummary {
                id: c.id,
                other_user_id,
                other_username: usernames.get(&other_user_id).cloned().unwrap_or_default(),
                last_message: last.map(|m| m.content.clone()),
                last_message_at: last.map(|m| m.sent_at),
                created_at: c.created_at,
            }
        })
        .collect();

    // Most recently active first; never-messaged conversations sort last by
    // creation time.
    summaries.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then(b.created_at.cmp(&a.created_at))
    });

    Ok(Json(summaries))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations/:conversation_id/messages
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversation_id}/messages",
    tag = "Conversations",
    params(("conversation_id" = i64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Full message history, oldest first", body = [PersistedMessage]),
        (status = 403, description = "Caller is not a participant", body = ApiErrorBody),
    ),
)]
pub async fn list_messages(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<PersistedMessage>>, ApiError> {
    if !Conversation::is_member(&state.db, conversation_id, user_id).await? {
        return Err(ApiError::forbidden(
            "You are not a participant of this conversation",
        ));
    }

    let mut conn = state.db.get().await?;

    let rows: Vec<(Message, String)> = messages::table
        .inner_join(users::table)
        .filter(messages::conversation_id.eq(conversation_id))
        .order((messages::sent_at.asc(), messages::id.asc()))
        .select((Message::as_select(), users::username))
        .load(&mut conn)
        .await?;

    let history = rows
        .into_iter()
        .map(|(message, sender_username)| PersistedMessage::from_row(message, sender_username))
        .collect();

    Ok(Json(history))
}

//! Message send endpoint: the durable-write half of the delivery path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::messages;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, NewMessage, PersistedMessage};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/messages", post(send_message))
}

// ---------------------------------------------------------------------------
// POST /api/v1/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub conversation_id: i64,
    pub content: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message persisted (and fanned out to live members)", body = PersistedMessage),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 403, description = "Caller is not a participant", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    AuthUser { user_id, username }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<PersistedMessage>), ApiError> {
    let content = body.content.trim();

    let mut errors = Vec::new();
    if content.is_empty() {
        errors.push(FieldError {
            field: "content".to_string(),
            message: "Message content is required".to_string(),
        });
    } else if content.len() > 4000 {
        errors.push(FieldError {
            field: "content".to_string(),
            message: "Message content must be 4000 characters or fewer".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    if !Conversation::is_member(&state.db, body.conversation_id, user_id).await? {
        return Err(ApiError::forbidden(
            "You are not a participant of this conversation",
        ));
    }

    let mut conn = state.db.get().await?;

    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            conversation_id: body.conversation_id,
            sender_id: user_id,
            content,
        })
        .returning(Message::as_returning())
        .get_result(&mut conn)
        .await?;

    // The insert has committed; fan-out comes strictly after and can no
    // longer affect the write result.
    let persisted = PersistedMessage::from_row(message, username);
    state.bridge.deliver(persisted.clone());

    Ok((StatusCode::CREATED, Json(persisted)))
}

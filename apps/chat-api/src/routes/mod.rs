pub mod auth;
pub mod conversations;
pub mod health;
pub mod messages;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            auth::router()
                .merge(conversations::router())
                .merge(messages::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::register,
        auth::login,
        // Conversations
        conversations::create_conversation,
        conversations::list_conversations,
        conversations::list_messages,
        // Messages
        messages::send_message,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::conversation::Conversation,
            crate::models::conversation::ConversationSummary,
            crate::models::message::PersistedMessage,
            crate::models::user::UserInfo,
            // Route request/response types
            health::HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            conversations::CreateConversationRequest,
            messages::SendMessageRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Registration and login"),
        (name = "Conversations", description = "Direct-message conversations"),
        (name = "Messages", description = "Message sending"),
    )
)]
pub struct ApiDoc;

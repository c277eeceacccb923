use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;

use chat_api::config::Config;
use chat_api::AppState;

/// Build a test AppState against the `_test` database.
pub async fn test_state() -> AppState {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let mut config = Config::from_env();
    config.database_url = with_test_db_suffix(&config.database_url);

    let db = chat_api::db::pool::connect(&config.database_url).await;
    AppState::new(db, Arc::new(config))
}

/// Append `_test` to the database name in a connection string, preserving
/// any query parameters. Mirrors the `--test` switch of `chat-migrate`.
fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{prefix}/{db_name}_test?{query}"),
        None => format!("{prefix}/{db_name}_test"),
    }
}

/// Build the full application router wired to the test state.
pub async fn test_app() -> (TestServer, AppState) {
    let state = test_state().await;
    let app: Router = chat_api::routes::router().with_state(state.clone());
    (TestServer::new(app).expect("test server"), state)
}

/// Generate a username that is unique across test processes and threads.
pub fn unique_username(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{prefix}_{:x}{nanos:x}_{n}", std::process::id())
}

/// Register a fresh user and log them in. Returns (user_id, token).
pub async fn register_and_login(server: &TestServer, username: &str) -> (i64, String) {
    let resp = server
        .post("/api/v1/auth/register")
        .json(&serde_json::json!({ "username": username, "password": "hunter2hunter2" }))
        .await;
    resp.assert_status(http::StatusCode::CREATED);
    let user_id = resp.json::<serde_json::Value>()["id"].as_i64().unwrap();

    let resp = server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({ "username": username, "password": "hunter2hunter2" }))
        .await;
    resp.assert_status_ok();
    let token = resp.json::<serde_json::Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();

    (user_id, token)
}

/// Create (or fetch) the conversation between the caller and `other_username`.
pub async fn create_conversation(server: &TestServer, token: &str, other_username: &str) -> i64 {
    let resp = server
        .post("/api/v1/conversations")
        .authorization_bearer(token)
        .json(&serde_json::json!({ "username": other_username }))
        .await;
    resp.json::<serde_json::Value>()["id"].as_i64().unwrap()
}

/// Delete a test user. CASCADE takes their conversations and messages along.
pub async fn cleanup_test_user(db: &chat_api::db::pool::DbPool, user_id: i64) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    let mut conn = db.get().await.expect("pool");
    diesel::delete(
        chat_api::db::schema::users::table.filter(chat_api::db::schema::users::id.eq(user_id)),
    )
    .execute(&mut conn)
    .await
    .ok();
}

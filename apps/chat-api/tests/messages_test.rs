mod common;

use http::StatusCode;

#[tokio::test]
async fn send_message_persists_and_returns_the_record() {
    let (server, state) = common::test_app().await;
    let name_a = common::unique_username("senda");
    let name_b = common::unique_username("sendb");

    let (id_a, token_a) = common::register_and_login(&server, &name_a).await;
    let (id_b, _token_b) = common::register_and_login(&server, &name_b).await;
    let conv_id = common::create_conversation(&server, &token_a, &name_b).await;

    let resp = server
        .post("/api/v1/messages")
        .authorization_bearer(&token_a)
        .json(&serde_json::json!({ "conversation_id": conv_id, "content": "  hello there  " }))
        .await;
    resp.assert_status(StatusCode::CREATED);

    let message = resp.json::<serde_json::Value>();
    assert!(message["id"].as_i64().unwrap() > 0);
    assert_eq!(message["conversation_id"].as_i64().unwrap(), conv_id);
    assert_eq!(message["sender_id"].as_i64().unwrap(), id_a);
    assert_eq!(message["sender_username"], name_a.as_str());
    assert_eq!(message["content"], "hello there");
    assert!(message["sent_at"].is_string());

    common::cleanup_test_user(&state.db, id_a).await;
    common::cleanup_test_user(&state.db, id_b).await;
}

#[tokio::test]
async fn send_to_foreign_conversation_is_forbidden_and_not_persisted() {
    let (server, state) = common::test_app().await;
    let name_a = common::unique_username("fora");
    let name_b = common::unique_username("forb");
    let name_c = common::unique_username("forc");

    let (id_a, token_a) = common::register_and_login(&server, &name_a).await;
    let (id_b, _token_b) = common::register_and_login(&server, &name_b).await;
    let (id_c, token_c) = common::register_and_login(&server, &name_c).await;
    let conv_id = common::create_conversation(&server, &token_a, &name_b).await;

    let resp = server
        .post("/api/v1/messages")
        .authorization_bearer(&token_c)
        .json(&serde_json::json!({ "conversation_id": conv_id, "content": "intrusion" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    // Nothing was written: the participants see an empty history.
    let resp = server
        .get(&format!("/api/v1/conversations/{conv_id}/messages"))
        .authorization_bearer(&token_a)
        .await;
    resp.assert_status_ok();
    assert!(resp.json::<serde_json::Value>().as_array().unwrap().is_empty());

    common::cleanup_test_user(&state.db, id_a).await;
    common::cleanup_test_user(&state.db, id_b).await;
    common::cleanup_test_user(&state.db, id_c).await;
}

#[tokio::test]
async fn send_rejects_empty_content() {
    let (server, state) = common::test_app().await;
    let name_a = common::unique_username("empa");
    let name_b = common::unique_username("empb");

    let (id_a, token_a) = common::register_and_login(&server, &name_a).await;
    let (id_b, _token_b) = common::register_and_login(&server, &name_b).await;
    let conv_id = common::create_conversation(&server, &token_a, &name_b).await;

    let resp = server
        .post("/api/v1/messages")
        .authorization_bearer(&token_a)
        .json(&serde_json::json!({ "conversation_id": conv_id, "content": "   " }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body = resp.json::<serde_json::Value>();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    common::cleanup_test_user(&state.db, id_a).await;
    common::cleanup_test_user(&state.db, id_b).await;
}

#[tokio::test]
async fn send_rejects_oversized_content() {
    let (server, state) = common::test_app().await;
    let name_a = common::unique_username("biga");
    let name_b = common::unique_username("bigb");

    let (id_a, token_a) = common::register_and_login(&server, &name_a).await;
    let (id_b, _token_b) = common::register_and_login(&server, &name_b).await;
    let conv_id = common::create_conversation(&server, &token_a, &name_b).await;

    let resp = server
        .post("/api/v1/messages")
        .authorization_bearer(&token_a)
        .json(&serde_json::json!({ "conversation_id": conv_id, "content": "x".repeat(4001) }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    common::cleanup_test_user(&state.db, id_a).await;
    common::cleanup_test_user(&state.db, id_b).await;
}

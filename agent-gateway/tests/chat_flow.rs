mod support;

use agent_gateway::app::build_router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use serde_json::{json, Value};
use support::TestBackends;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn authed_state(idp: &MockServer, llm: &str) -> (agent_gateway::AppState, String) {
    idp.mock(|when, then| {
        when.method(GET).path("/rest/v1/profiles");
        then.status(200).json_body(json!([{
            "id": "u-1",
            "email": "a@b.com",
            "full_name": "A B",
            "role": "developer",
        }]));
    });

    let state = support::test_state(&TestBackends {
        idp: &idp.base_url(),
        llm,
        ..Default::default()
    });
    let token = state
        .codec
        .issue("u-1", serde_json::Map::new())
        .expect("issue");
    (state, token)
}

fn chat_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/chat/")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn chat_round_trip_stores_both_turns() {
    let idp = MockServer::start();
    let llm = MockServer::start();
    let completion = llm.mock(|when, then| {
        when.method(POST)
            .path("/openai/deployments/gpt-4-mini/chat/completions")
            .query_param("api-version", "2024-10-01-preview");
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Use terraform plan first." } }
            ]
        }));
    });

    let (state, token) = authed_state(&idp, &llm.base_url());
    let app = build_router(state.clone());

    let response = app
        .oneshot(chat_request(
            &token,
            json!({ "message": "How do I review infra changes?" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Use terraform plan first.");
    assert_eq!(body["sources"], json!([]));
    let conversation_id = body["conversation_id"].as_str().expect("conversation id");
    assert!(!conversation_id.is_empty());
    assert_eq!(completion.hits(), 1);

    let history = state.conversations.recent(conversation_id, 10).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
}

#[tokio::test]
async fn chat_reuses_a_supplied_conversation_id() {
    let idp = MockServer::start();
    let llm = MockServer::start();
    llm.mock(|when, then| {
        when.method(POST)
            .path("/openai/deployments/gpt-4-mini/chat/completions");
        then.status(200).json_body(json!({
            "choices": [ { "message": { "role": "assistant", "content": "ok" } } ]
        }));
    });

    let (state, token) = authed_state(&idp, &llm.base_url());

    for _ in 0..2 {
        let app = build_router(state.clone());
        let response = app
            .oneshot(chat_request(
                &token,
                json!({ "message": "hello", "conversation_id": "conv-1" }),
            ))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["conversation_id"], "conv-1");
    }

    let history = state.conversations.recent("conv-1", 10).await;
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let idp = MockServer::start();
    let (state, token) = authed_state(&idp, "http://127.0.0.1:1");
    let app = build_router(state);

    let response = app
        .oneshot(chat_request(&token, json!({ "message": "   " })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["type"], "chat/empty-message");
}

#[tokio::test]
async fn llm_failure_maps_to_upstream_error() {
    let idp = MockServer::start();
    let llm = MockServer::start();
    llm.mock(|when, then| {
        when.method(POST)
            .path("/openai/deployments/gpt-4-mini/chat/completions");
        then.status(500).body("backend exploded");
    });

    let (state, token) = authed_state(&idp, &llm.base_url());
    let app = build_router(state.clone());

    let response = app
        .oneshot(chat_request(&token, json!({ "message": "hello" })))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["type"], "llm/upstream-error");
    // Failed turns are not recorded.
    let history = state.conversations.recent("conv-1", 10).await;
    assert!(history.is_empty());
}

mod support;

use agent_gateway::app::build_router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use serde_json::Value;
use support::TestBackends;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn public_paths_never_invoke_the_verifier() {
    let server = MockServer::start();
    let introspect = server.mock(|when, then| {
        when.method(GET).path("/auth/v1/user");
        then.status(200);
    });
    let profiles = server.mock(|when, then| {
        when.method(GET).path("/rest/v1/profiles");
        then.status(200);
    });

    let state = support::test_state(&TestBackends {
        idp: &server.base_url(),
        ..Default::default()
    });

    for path in ["/", "/health", "/docs", "/openapi.json", "/metrics"] {
        let app = build_router(state.clone());
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }

    assert_eq!(introspect.hits(), 0);
    assert_eq!(profiles.hits(), 0);
}

#[tokio::test]
async fn protected_path_without_credentials_is_problem_401() {
    let state = support::test_state(&TestBackends::default());
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/profile/u-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("x-error-code").unwrap(),
        "auth/invalid-token"
    );

    let body = body_json(response).await;
    assert_eq!(body["type"], "auth/invalid-token");
    assert_eq!(body["title"], "Invalid Token");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn chat_requires_a_bearer_token() {
    let state = support::test_state(&TestBackends::default());
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/chat/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"message":"hi"}"#))
                .unwrap(),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The LINE webhook endpoint.
//!
//! Signature verification runs over the raw body bytes before any JSON
//! parsing. Once the envelope parses, the request is acknowledged with 200
//! no matter how individual events fare; per-event failures are the
//! ingestor's problem.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use nagare_line::signature;
use nagare_line::WebhookEnvelope;
use serde::Serialize;

use crate::server::AppState;

/// Acknowledgement body returned to the LINE platform.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ack_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(WebhookAck {
            success: false,
            error: Some(message.to_string()),
        }),
    )
        .into_response()
}

/// `POST /webhook`.
pub async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.channel_secret.as_deref().filter(|s| !s.is_empty()) else {
        tracing::error!("webhook received but no channel secret is configured, rejecting");
        return ack_error(
            StatusCode::FORBIDDEN,
            "signature verification is not configured",
        );
    };

    let Some(signature_header) = headers.get("x-line-signature").and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("webhook request without x-line-signature header");
        return ack_error(StatusCode::BAD_REQUEST, "missing x-line-signature header");
    };

    if let Err(e) = signature::verify_signature(secret, &body, signature_header) {
        tracing::warn!(error = %e, "webhook signature verification failed");
        return ack_error(StatusCode::FORBIDDEN, "invalid signature");
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body failed to parse");
            return ack_error(StatusCode::BAD_REQUEST, "malformed webhook payload");
        }
    };

    state.ingestor.handle_batch(envelope).await;

    (
        StatusCode::OK,
        Json(WebhookAck {
            success: true,
            error: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use nagare_engine::ReplyStrategy;
    use nagare_storage::queries::contacts;
    use nagare_test_utils::{open_test_db, MockPlatform, TestDb};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::AuthConfig;
    use crate::server::build_router;

    const SECRET: &str = "webhook-test-secret";

    async fn setup() -> (TestDb, axum::Router) {
        setup_with_secret(Some(SECRET.to_string())).await
    }

    async fn setup_with_secret(secret: Option<String>) -> (TestDb, axum::Router) {
        let test_db = open_test_db().await.unwrap();
        let platform = Arc::new(MockPlatform::new());
        let state = AppState::new(
            test_db.db.clone(),
            platform,
            ReplyStrategy::Echo,
            secret,
            50,
        );
        let router = build_router(
            state,
            AuthConfig {
                bearer_token: Some("test-token".to_string()),
            },
        );
        (test_db, router)
    }

    fn signed_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-line-signature", signature::sign(SECRET, body.as_bytes()))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn valid_signature_acknowledges_and_processes() {
        let (test_db, router) = setup().await;
        let body = r#"{"events":[{"type":"follow","replyToken":"rt-f","source":{"type":"user","userId":"U-hook"}}]}"#;

        let response = router.oneshot(signed_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));

        let contact = contacts::find_by_line_user_id(&test_db.db, "U-hook")
            .await
            .unwrap();
        assert!(contact.is_some());
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let (_test_db, router) = setup().await;
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"events":[]}"#))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let (_test_db, router) = setup().await;
        let signed = r#"{"events":[]}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-line-signature", signature::sign(SECRET, signed.as_bytes()))
            .body(Body::from(r#"{ "events": [] }"#))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_secret_signature_is_rejected() {
        let (_test_db, router) = setup().await;
        let body = r#"{"events":[]}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(
                "x-line-signature",
                signature::sign("some-other-secret", body.as_bytes()),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["success"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn malformed_json_with_valid_signature_is_bad_request() {
        let (_test_db, router) = setup().await;

        let response = router
            .oneshot(signed_request("this is not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unconfigured_secret_fails_closed() {
        let (_test_db, router) = setup_with_secret(None).await;

        let response = router
            .oneshot(signed_request(r#"{"events":[]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn envelope_without_events_is_acknowledged() {
        let (_test_db, router) = setup().await;

        let response = router
            .oneshot(signed_request(r#"{"destination":"U0"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));
    }

    #[tokio::test]
    async fn event_failures_do_not_change_the_ack() {
        let (test_db, router) = setup().await;
        // One unparseable event, one message without a user id. Both are
        // skipped by the ingestor and neither touches the response.
        let body = r#"{"events":[42,{"type":"message","source":{"type":"group","groupId":"G1"}}]}"#;

        let response = router.oneshot(signed_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));

        let contact = contacts::find_by_line_user_id(&test_db.db, "G1").await.unwrap();
        assert!(contact.is_none());
    }
}

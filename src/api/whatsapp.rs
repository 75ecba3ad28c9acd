use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::state::AppState;
use crate::services::WebhookPayload;

/// WhatsApp Cloud API webhook: GET handshake + POST message intake.
/// The handshake token is the only authentication the Graph API offers here.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echo the challenge when the verify token matches
#[tracing::instrument(skip(state, params))]
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, StatusCode> {
    let token_matches = params.verify_token.as_deref() == Some(state.whatsapp.verify_token());
    let is_subscribe = params.mode.as_deref() == Some("subscribe");

    match (is_subscribe, token_matches, params.challenge) {
        (true, true, Some(challenge)) => {
            info!("whatsapp webhook verified");
            Ok(challenge)
        }
        _ => {
            warn!("whatsapp webhook verification failed");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

/// Inbound messages. Always 200: the bot logs its own failures, and a non-200
/// would only make the Graph API re-deliver the same payload.
#[tracing::instrument(skip(state, payload))]
async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Json<Value> {
    state.whatsapp.handle_inbound(payload).await;
    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_handshake_echoes_the_challenge() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-secret&hub.challenge=1158201444")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"1158201444");
    }

    #[tokio::test]
    async fn test_handshake_rejects_a_wrong_token() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_handshake_requires_subscribe_mode() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.verify_token=verify-secret&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

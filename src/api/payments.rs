use axum::{
    extract::State,
    http::HeaderMap,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserRole, UserSession};
use crate::models::{
    CreatePaymentRequest, CreateSubscriptionRequest, Invoice, Payment, PaymentWebhookEvent,
    Subscription,
};
use crate::services::{EmailKind, SignatureValidation, WebhookOutcome};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/", post(create_payment))
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/list", get(list_subscriptions))
        .route("/invoices", get(list_invoices))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    let authed = Router::new()
        .route("/", get(list_payments))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ));

    // The provider webhook authenticates by signature, not by JWT
    Router::new()
        .route("/webhook", post(payment_webhook))
        .merge(authed)
        .with_state(state)
}

/// Record a pending payment for a linked client
#[tracing::instrument(skip(state, session, request))]
async fn create_payment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state.payments.create(session.user_id, request).await?;
    Ok(Json(payment))
}

/// Payments visible to the caller: own payments for clients, received
/// payments for trainers
#[tracing::instrument(skip(state, session))]
async fn list_payments(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let payments = match session.role {
        UserRole::Client => state.payments.list_for_client(session.user_id).await?,
        UserRole::Trainer | UserRole::Admin => {
            state.payments.list_for_trainer(session.user_id).await?
        }
    };
    Ok(Json(payments))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = state
        .payments
        .create_subscription(session.user_id, request)
        .await?;
    Ok(Json(subscription))
}

#[tracing::instrument(skip(state, session))]
async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let subscriptions = state
        .payments
        .list_subscriptions_for_trainer(session.user_id)
        .await?;
    Ok(Json(subscriptions))
}

#[tracing::instrument(skip(state, session))]
async fn list_invoices(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let invoices = state
        .payments
        .list_invoices_for_trainer(session.user_id)
        .await?;
    Ok(Json(invoices))
}

/// Provider webhook: HMAC-signed raw body.
///
/// An invalid signature changes no state. A replayed event answers 200
/// without side effects so the provider stops re-delivering.
#[tracing::instrument(skip(state, headers, body))]
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());

    match state.payments.validate_signature(signature, &body) {
        SignatureValidation::Valid => {}
        SignatureValidation::Missing | SignatureValidation::Invalid => {
            warn!("rejected payment webhook with bad signature");
            return Err(ApiError::Unauthorized);
        }
        SignatureValidation::NotConfigured => {
            error!("payment webhook received but no secret is configured");
            return Err(ApiError::Unauthorized);
        }
    }

    let event: PaymentWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook body: {e}")))?;

    let outcome = state.payments.process_event(event).await?;

    if let WebhookOutcome::Approved { payment, invoice } = &outcome {
        if let Ok(Some(client)) = state.auth.get_user_by_id(payment.client_id).await {
            let email = state.email.clone();
            let amount = format!("{:.2}", payment.amount);
            let currency = payment.currency.clone();
            let invoice_number = invoice.number.to_string();
            tokio::spawn(async move {
                if let Err(e) = email
                    .send(
                        &client.email,
                        &client.full_name,
                        EmailKind::PaymentReceipt,
                        &[
                            ("user_name", client.full_name.as_str()),
                            ("amount", amount.as_str()),
                            ("currency", currency.as_str()),
                            ("invoice_number", invoice_number.as_str()),
                        ],
                    )
                    .await
                {
                    error!("payment receipt email to {} failed: {e}", client.email);
                }
            });
        }
    }

    let status = match outcome {
        WebhookOutcome::Approved { .. } => "approved",
        WebhookOutcome::Rejected { .. } => "rejected",
        WebhookOutcome::Ignored => "ignored",
    };

    Ok(Json(json!({ "success": true, "result": status })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_webhook_without_signature_is_unauthorized() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_with_forged_signature_is_unauthorized() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .header("x-signature", "t=1700000000,v1=deadbeef")
                    .body(Body::from(r#"{"id":"evt_1","type":"payment.approved"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticated_routes_require_a_token() {
        let app = routes(AppState::for_tests());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

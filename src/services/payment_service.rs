use chrono::{Duration, Utc};
use ring::hmac;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{
    CreateNotification, CreatePaymentRequest, CreateSubscriptionRequest, Invoice,
    NotificationPriority, NotificationType, Payment, PaymentStatus, PaymentWebhookEvent,
    Subscription,
};
use crate::services::NotificationService;

const PAYMENT_COLUMNS: &str = "id, client_id, trainer_id, subscription_id, amount, currency, \
                               description, external_reference, status, paid_at, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, client_id, trainer_id, plan_name, monthly_price, currency, \
                                    status, current_period_start, current_period_end, created_at, updated_at";

/// Result of a webhook signature check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureValidation {
    Valid,
    Invalid,
    Missing,
    NotConfigured,
}

/// Outcome of processing one provider event
#[derive(Debug)]
pub enum WebhookOutcome {
    Approved { payment: Payment, invoice: Invoice },
    Rejected { payment: Payment },
    /// Unknown event type or already-processed payment; a replayed event
    /// must not change state
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    db: PgPool,
    notifications: NotificationService,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(db: PgPool, notifications: NotificationService, webhook_secret: String) -> Self {
        Self {
            db,
            notifications,
            webhook_secret,
        }
    }

    /// Record a pending payment for a linked client
    pub async fn create(
        &self,
        trainer_id: Uuid,
        request: CreatePaymentRequest,
    ) -> Result<Payment, ApiError> {
        if request.amount <= 0.0 {
            return Err(ApiError::BadRequest("amount must be positive".into()));
        }

        let linked: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM trainer_clients
             WHERE trainer_id = $1 AND client_id = $2 AND status = 'active'",
        )
        .bind(trainer_id)
        .bind(request.client_id)
        .fetch_optional(&self.db)
        .await?;

        if linked.is_none() {
            return Err(ApiError::NotFound);
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (id, client_id, trainer_id, subscription_id, amount, currency, description, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.client_id)
        .bind(trainer_id)
        .bind(request.subscription_id)
        .bind(request.amount)
        .bind(request.currency.unwrap_or_else(|| "USD".to_string()))
        .bind(&request.description)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(payment)
    }

    pub async fn list_for_trainer(&self, trainer_id: Uuid) -> Result<Vec<Payment>, ApiError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE trainer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Payment>, ApiError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE client_id = $1 ORDER BY created_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    pub async fn create_subscription(
        &self,
        trainer_id: Uuid,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, ApiError> {
        if request.monthly_price <= 0.0 {
            return Err(ApiError::BadRequest("monthly_price must be positive".into()));
        }

        let now = Utc::now();
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions (id, client_id, trainer_id, plan_name, monthly_price, currency, status, current_period_start, current_period_end, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8, $7, $7)
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.client_id)
        .bind(trainer_id)
        .bind(&request.plan_name)
        .bind(request.monthly_price)
        .bind(request.currency.unwrap_or_else(|| "USD".to_string()))
        .bind(now)
        .bind(now + Duration::days(30))
        .fetch_one(&self.db)
        .await?;

        Ok(subscription)
    }

    pub async fn list_subscriptions_for_trainer(
        &self,
        trainer_id: Uuid,
    ) -> Result<Vec<Subscription>, ApiError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE trainer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(subscriptions)
    }

    pub async fn list_invoices_for_trainer(
        &self,
        trainer_id: Uuid,
    ) -> Result<Vec<Invoice>, ApiError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT id, number, trainer_id, client_id, payment_id, amount, currency, issued_at
             FROM invoices WHERE trainer_id = $1 ORDER BY number DESC",
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(invoices)
    }

    /// Validate the webhook signature header against the raw request body.
    ///
    /// Header format is `t=<unix-ts>,v1=<hex hmac-sha256 of "t.body">`.
    pub fn validate_signature(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> SignatureValidation {
        if self.webhook_secret.is_empty() {
            return SignatureValidation::NotConfigured;
        }

        let Some(header) = signature_header else {
            return SignatureValidation::Missing;
        };

        let Some((timestamp, signature_hex)) = parse_signature_header(header) else {
            return SignatureValidation::Invalid;
        };

        let Ok(signature) = hex::decode(signature_hex) else {
            return SignatureValidation::Invalid;
        };

        let key = hmac::Key::new(hmac::HMAC_SHA256, self.webhook_secret.as_bytes());
        let mut signed = timestamp.as_bytes().to_vec();
        signed.push(b'.');
        signed.extend_from_slice(body);

        match hmac::verify(&key, &signed, &signature) {
            Ok(()) => SignatureValidation::Valid,
            Err(_) => SignatureValidation::Invalid,
        }
    }

    /// Apply one provider event. Replays are a no-op.
    pub async fn process_event(
        &self,
        event: PaymentWebhookEvent,
    ) -> Result<WebhookOutcome, ApiError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(event.data.payment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)?;

        match event.event_type.as_str() {
            "payment.approved" => {
                if payment.status == PaymentStatus::Approved {
                    info!("webhook replay for approved payment {}, ignoring", payment.id);
                    return Ok(WebhookOutcome::Ignored);
                }
                self.approve_payment(payment, &event).await
            }
            "payment.rejected" => {
                if payment.status != PaymentStatus::Pending {
                    return Ok(WebhookOutcome::Ignored);
                }
                self.reject_payment(payment, &event).await
            }
            other => {
                warn!("unhandled webhook event type {other}");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Approval flips the payment, extends the subscription, issues the
    /// invoice and notifies both parties in a single transaction.
    async fn approve_payment(
        &self,
        payment: Payment,
        event: &PaymentWebhookEvent,
    ) -> Result<WebhookOutcome, ApiError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = 'approved', paid_at = $2, external_reference = $3, updated_at = $2
             WHERE id = $1 AND status <> 'approved'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(now)
        .bind(&event.data.reference)
        .fetch_optional(&mut *tx)
        .await?;

        // A concurrent webhook delivery won the row; nothing left to do
        let Some(payment) = payment else {
            return Ok(WebhookOutcome::Ignored);
        };

        if let Some(subscription_id) = payment.subscription_id {
            sqlx::query(
                "UPDATE subscriptions
                 SET status = 'active',
                     current_period_start = $2,
                     current_period_end = $3,
                     updated_at = $2
                 WHERE id = $1",
            )
            .bind(subscription_id)
            .bind(now)
            .bind(now + Duration::days(30))
            .execute(&mut *tx)
            .await?;
        }

        let (next_number,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(number), 0) + 1 FROM invoices WHERE trainer_id = $1",
        )
        .bind(payment.trainer_id)
        .fetch_one(&mut *tx)
        .await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoices (id, number, trainer_id, client_id, payment_id, amount, currency, issued_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, number, trainer_id, client_id, payment_id, amount, currency, issued_at",
        )
        .bind(Uuid::new_v4())
        .bind(next_number)
        .bind(payment.trainer_id)
        .bind(payment.client_id)
        .bind(payment.id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (user_id, title) in [
            (payment.client_id, "Payment approved"),
            (payment.trainer_id, "Client payment received"),
        ] {
            self.notifications
                .notify_in_tx(
                    &mut tx,
                    CreateNotification {
                        user_id,
                        notification_type: NotificationType::PaymentApproved,
                        priority: NotificationPriority::Medium,
                        title: title.to_string(),
                        body: format!(
                            "Payment of {} {} confirmed (invoice #{})",
                            payment.amount, payment.currency, invoice.number
                        ),
                        data: Some(serde_json::json!({
                            "payment_id": payment.id,
                            "invoice_id": invoice.id,
                        })),
                    },
                )
                .await?;
        }

        tx.commit().await?;

        info!(
            "payment {} approved, invoice #{} issued for trainer {}",
            payment.id, invoice.number, payment.trainer_id
        );

        Ok(WebhookOutcome::Approved { payment, invoice })
    }

    async fn reject_payment(
        &self,
        payment: Payment,
        event: &PaymentWebhookEvent,
    ) -> Result<WebhookOutcome, ApiError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = 'rejected', external_reference = $3, updated_at = $2
             WHERE id = $1 AND status = 'pending'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(now)
        .bind(&event.data.reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = payment else {
            return Ok(WebhookOutcome::Ignored);
        };

        self.notifications
            .notify_in_tx(
                &mut tx,
                CreateNotification {
                    user_id: payment.trainer_id,
                    notification_type: NotificationType::PaymentRejected,
                    priority: NotificationPriority::High,
                    title: "Payment rejected".to_string(),
                    body: format!(
                        "A payment of {} {} was rejected by the provider",
                        payment.amount, payment.currency
                    ),
                    data: Some(serde_json::json!({ "payment_id": payment.id })),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(WebhookOutcome::Rejected { payment })
    }
}

/// Parse a `t=<ts>,v1=<hex>` signature header
fn parse_signature_header(header: &str) -> Option<(&str, &str)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = Some(value);
        } else if let Some(value) = part.strip_prefix("v1=") {
            signature = Some(value);
        }
    }

    Some((timestamp?, signature?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let mut signed = timestamp.as_bytes().to_vec();
        signed.push(b'.');
        signed.extend_from_slice(body);
        hex::encode(hmac::sign(&key, &signed).as_ref())
    }

    fn service_with_secret(secret: &str) -> PaymentService {
        let db = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let notifications = NotificationService::new(db.clone());
        PaymentService::new(db, notifications, secret.to_string())
    }

    #[test]
    fn test_parse_signature_header() {
        assert_eq!(
            parse_signature_header("t=1700000000,v1=deadbeef"),
            Some(("1700000000", "deadbeef"))
        );
        assert_eq!(
            parse_signature_header("v1=deadbeef,t=1700000000"),
            Some(("1700000000", "deadbeef"))
        );
        assert_eq!(parse_signature_header("t=1700000000"), None);
        assert_eq!(parse_signature_header("garbage"), None);
    }

    #[tokio::test]
    async fn test_valid_signature_accepted() {
        let service = service_with_secret("whsec_test");
        let body = br#"{"id":"evt_1","type":"payment.approved"}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", "1700000000", body));

        assert_eq!(
            service.validate_signature(Some(&header), body),
            SignatureValidation::Valid
        );
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let service = service_with_secret("whsec_test");
        let body = br#"{"id":"evt_1","type":"payment.approved"}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", "1700000000", body));

        assert_eq!(
            service.validate_signature(Some(&header), b"{\"id\":\"evt_2\"}"),
            SignatureValidation::Invalid
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let service = service_with_secret("whsec_test");
        let body = b"{}";
        let header = format!("t=1,v1={}", sign("other_secret", "1", body));

        assert_eq!(
            service.validate_signature(Some(&header), body),
            SignatureValidation::Invalid
        );
    }

    #[tokio::test]
    async fn test_missing_and_unconfigured() {
        let service = service_with_secret("whsec_test");
        assert_eq!(
            service.validate_signature(None, b"{}"),
            SignatureValidation::Missing
        );

        let unconfigured = service_with_secret("");
        assert_eq!(
            unconfigured.validate_signature(Some("t=1,v1=00"), b"{}"),
            SignatureValidation::NotConfigured
        );
    }
}

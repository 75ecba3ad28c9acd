use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub trainer_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
    /// Payment id on the provider's side, set once the webhook confirms it
    pub external_reference: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub client_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: f64,
    pub currency: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub client_id: Uuid,
    pub trainer_id: Uuid,
    pub plan_name: String,
    pub monthly_price: f64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub client_id: Uuid,
    pub plan_name: String,
    pub monthly_price: f64,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    /// Sequential per trainer, assigned when the payment is approved
    pub number: i64,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub payment_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

/// Payment provider webhook body.
///
/// Mirrors the Mercado-Pago/Stripe event shape: an event id, an event type,
/// and a data object referencing our payment by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentWebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookData {
    pub payment_id: Uuid,
    /// Provider-side payment reference
    pub reference: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

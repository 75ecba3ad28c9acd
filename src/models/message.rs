use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "message_direction", rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// WhatsApp conversation log row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhatsAppMessage {
    pub id: Uuid,
    /// Linked user when the phone number matched an account
    pub user_id: Option<Uuid>,
    pub phone: String,
    pub direction: MessageDirection,
    pub body: String,
    /// Message id assigned by the Graph API
    pub wa_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

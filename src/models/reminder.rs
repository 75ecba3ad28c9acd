use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "reminder_channel", rename_all = "snake_case")]
pub enum ReminderChannel {
    InApp,
    Email,
    Whatsapp,
}

impl sqlx::postgres::PgHasArrayType for ReminderChannel {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_reminder_channel")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "reminder_status", rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    /// Trainer who owns the reminder
    pub owner_id: Uuid,
    /// Optional client target; reminders without one go to the owner
    pub client_id: Option<Uuid>,
    pub message: String,
    pub due_at: DateTime<Utc>,
    pub channels: Vec<ReminderChannel>,
    pub status: ReminderStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub client_id: Option<Uuid>,
    pub message: String,
    pub due_at: DateTime<Utc>,
    pub channels: Vec<ReminderChannel>,
}

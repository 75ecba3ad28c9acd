use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{CreateReminderRequest, Reminder};

const REMINDER_COLUMNS: &str = "id, owner_id, client_id, message, due_at, channels, status, \
                                sent_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ReminderService {
    db: PgPool,
}

impl ReminderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        request: CreateReminderRequest,
    ) -> Result<Reminder, ApiError> {
        if request.message.trim().is_empty() {
            return Err(ApiError::BadRequest("reminder message is required".into()));
        }
        if request.channels.is_empty() {
            return Err(ApiError::BadRequest(
                "at least one delivery channel is required".into(),
            ));
        }

        if let Some(client_id) = request.client_id {
            let linked: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM trainer_clients
                 WHERE trainer_id = $1 AND client_id = $2 AND status = 'active'",
            )
            .bind(owner_id)
            .bind(client_id)
            .fetch_optional(&self.db)
            .await?;

            if linked.is_none() {
                return Err(ApiError::NotFound);
            }
        }

        let reminder = sqlx::query_as::<_, Reminder>(&format!(
            "INSERT INTO reminders (id, owner_id, client_id, message, due_at, channels, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $7)
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(request.client_id)
        .bind(request.message.trim())
        .bind(request.due_at)
        .bind(&request.channels)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(reminder)
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Reminder>, ApiError> {
        let reminders = sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE owner_id = $1 ORDER BY due_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(reminders)
    }

    pub async fn cancel(&self, owner_id: Uuid, id: Uuid) -> Result<Reminder, ApiError> {
        let reminder = sqlx::query_as::<_, Reminder>(&format!(
            "UPDATE reminders SET status = 'cancelled', updated_at = $3
             WHERE id = $1 AND owner_id = $2 AND status = 'scheduled'
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        reminder.ok_or(ApiError::NotFound)
    }

    /// Scheduled reminders whose due time has passed
    pub async fn due_reminders(&self) -> Result<Vec<Reminder>, ApiError> {
        let reminders = sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'scheduled' AND due_at <= $1
             ORDER BY due_at"
        ))
        .bind(Utc::now())
        .fetch_all(&self.db)
        .await?;

        Ok(reminders)
    }

    /// Mark a reminder dispatched. Only flips rows still scheduled, so a
    /// competing dispatcher pass cannot double-send.
    pub async fn mark_sent(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE reminders SET status = 'sent', sent_at = $2, updated_at = $2
             WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

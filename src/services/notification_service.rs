use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{
    CreateNotification, Notification, NotificationQuery, UnreadCount,
};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, priority, title, body, data, read_at, created_at";

/// CRUD over the notifications table plus the emit helpers the other
/// services call when something noteworthy happens.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db: PgPool,
}

impl NotificationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a notification
    pub async fn notify(&self, request: CreateNotification) -> Result<Notification, ApiError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, notification_type, priority, title, body, data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.notification_type)
        .bind(request.priority)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&request.data)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(notification)
    }

    /// Create a notification inside a caller-owned transaction
    pub async fn notify_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: CreateNotification,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, notification_type, priority, title, body, data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.notification_type)
        .bind(request.priority)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&request.data)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// List a user's notifications, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        query: NotificationQuery,
    ) -> Result<Vec<Notification>, ApiError> {
        let unread_only = query.unread_only.unwrap_or(false);
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);

        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<UnreadCount, ApiError> {
        let (unread,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(UnreadCount { unread })
    }

    /// Mark one notification read; scoped by owner
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, ApiError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3)
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        notification.ok_or(ApiError::NotFound)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

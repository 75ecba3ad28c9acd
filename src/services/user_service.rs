use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::{UserInfo, UserRole};

/// Admin-facing account management
#[derive(Debug, Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    role: UserRole,
    created_at: chrono::DateTime<Utc>,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UserInfo>, ApiError> {
        let users = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, full_name, role, created_at FROM users
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit.unwrap_or(50).clamp(1, 200))
        .bind(offset.unwrap_or(0).max(0))
        .fetch_all(&self.db)
        .await?;

        Ok(users
            .into_iter()
            .map(|u| UserInfo {
                id: u.id,
                email: u.email,
                full_name: u.full_name,
                role: u.role,
                created_at: u.created_at,
            })
            .collect())
    }

    pub async fn update_role(&self, user_id: Uuid, role: UserRole) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(role)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }
}

use anyhow::Context;
use chrono::Utc;
use sqlx::PgPool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{
    ClientProfile, ClientSummary, CreateNotification, NotificationPriority, NotificationType,
    TrainerClient, UpdateClientProfileRequest,
};
use crate::services::NotificationService;

const PROFILE_COLUMNS: &str = "id, user_id, goals, level, height_cm, weight_kg, birth_date, \
                               notes, avatar_path, created_at, updated_at";

/// Upload size cap for avatar images
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ClientService {
    db: PgPool,
    notifications: NotificationService,
}

impl ClientService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<ClientProfile, ApiError> {
        sqlx::query_as::<_, ClientProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM client_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateClientProfileRequest,
    ) -> Result<ClientProfile, ApiError> {
        let profile = sqlx::query_as::<_, ClientProfile>(&format!(
            "UPDATE client_profiles
             SET goals = COALESCE($2, goals),
                 level = COALESCE($3, level),
                 height_cm = COALESCE($4, height_cm),
                 weight_kg = COALESCE($5, weight_kg),
                 birth_date = COALESCE($6, birth_date),
                 notes = COALESCE($7, notes),
                 updated_at = $8
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(request.goals)
        .bind(request.level)
        .bind(request.height_cm)
        .bind(request.weight_kg)
        .bind(request.birth_date)
        .bind(request.notes)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        profile.ok_or(ApiError::NotFound)
    }

    /// Invite a client by email, creating a pending link
    pub async fn invite_client(
        &self,
        trainer_id: Uuid,
        client_email: &str,
    ) -> Result<TrainerClient, ApiError> {
        let client: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND role = 'client'")
                .bind(client_email)
                .fetch_optional(&self.db)
                .await?;

        let Some((client_id,)) = client else {
            return Err(ApiError::NotFound);
        };

        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM trainer_clients
             WHERE trainer_id = $1 AND client_id = $2 AND status <> 'inactive'",
        )
        .bind(trainer_id)
        .bind(client_id)
        .fetch_optional(&self.db)
        .await?;

        if existing.is_some() {
            return Err(ApiError::Conflict("client is already linked".into()));
        }

        let link = sqlx::query_as::<_, TrainerClient>(
            "INSERT INTO trainer_clients (id, trainer_id, client_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, 'pending', $4, $4)
             RETURNING id, trainer_id, client_id, status, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(client_id)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        self.notifications
            .notify(CreateNotification {
                user_id: client_id,
                notification_type: NotificationType::ClientLinked,
                priority: NotificationPriority::Medium,
                title: "Training invitation".to_string(),
                body: "A trainer invited you to join their roster".to_string(),
                data: Some(serde_json::json!({ "link_id": link.id })),
            })
            .await?;

        Ok(link)
    }

    /// Client accepts a pending invite
    pub async fn accept_invite(&self, client_id: Uuid, link_id: Uuid) -> Result<TrainerClient, ApiError> {
        let mut tx = self.db.begin().await?;

        let link = sqlx::query_as::<_, TrainerClient>(
            "UPDATE trainer_clients SET status = 'active', updated_at = $3
             WHERE id = $1 AND client_id = $2 AND status = 'pending'
             RETURNING id, trainer_id, client_id, status, created_at, updated_at",
        )
        .bind(link_id)
        .bind(client_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound)?;

        self.notifications
            .notify_in_tx(
                &mut tx,
                CreateNotification {
                    user_id: link.trainer_id,
                    notification_type: NotificationType::ClientLinked,
                    priority: NotificationPriority::Medium,
                    title: "Invitation accepted".to_string(),
                    body: "Your client accepted the training invitation".to_string(),
                    data: Some(serde_json::json!({ "client_id": client_id })),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(link)
    }

    /// List a trainer's roster; never leaks other trainers' clients
    pub async fn list_clients(&self, trainer_id: Uuid) -> Result<Vec<ClientSummary>, ApiError> {
        let clients = sqlx::query_as::<_, ClientSummary>(
            "SELECT u.id AS client_id, u.full_name, u.email,
                    p.goals, p.level,
                    tc.status AS link_status, tc.created_at AS linked_at
             FROM trainer_clients tc
             JOIN users u ON u.id = tc.client_id
             JOIN client_profiles p ON p.user_id = u.id
             WHERE tc.trainer_id = $1 AND tc.status <> 'inactive'
             ORDER BY u.full_name",
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    /// Fetch one client's profile as their trainer. Unlinked clients are a 404.
    pub async fn get_client_for_trainer(
        &self,
        trainer_id: Uuid,
        client_id: Uuid,
    ) -> Result<ClientProfile, ApiError> {
        sqlx::query_as::<_, ClientProfile>(
            "SELECT p.id, p.user_id, p.goals, p.level, p.height_cm, p.weight_kg,
                    p.birth_date, p.notes, p.avatar_path, p.created_at, p.updated_at
             FROM client_profiles p
             JOIN trainer_clients tc ON tc.client_id = p.user_id
             WHERE tc.trainer_id = $1 AND tc.client_id = $2 AND tc.status = 'active'",
        )
        .bind(trainer_id)
        .bind(client_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    /// Deactivate a trainer-client link
    pub async fn detach_client(&self, trainer_id: Uuid, client_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE trainer_clients SET status = 'inactive', updated_at = $3
             WHERE trainer_id = $1 AND client_id = $2 AND status <> 'inactive'",
        )
        .bind(trainer_id)
        .bind(client_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }

    /// Store an uploaded avatar on disk and record its path on the profile
    pub async fn save_avatar(
        &self,
        user_id: Uuid,
        upload_dir: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        let extension = extension_for_mime(content_type).ok_or_else(|| {
            ApiError::BadRequest("avatar must be a jpeg, png or webp image".into())
        })?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("avatar file is empty".into()));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::BadRequest("avatar exceeds the 5 MiB limit".into()));
        }

        let dir = Path::new(upload_dir).join("avatars");
        tokio::fs::create_dir_all(&dir)
            .await
            .context("failed to create avatar directory")?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .context("failed to write avatar file")?;

        let public_path = format!("/uploads/avatars/{file_name}");

        let updated = sqlx::query(
            "UPDATE client_profiles SET avatar_path = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(&public_path)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        info!("stored avatar for user {user_id} at {public_path}");

        Ok(public_path)
    }
}

/// Accepted avatar content types and their file extensions
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let parsed: mime::Mime = content_type.parse().ok()?;
    match (parsed.type_(), parsed.subtype().as_str()) {
        (mime::IMAGE, "jpeg") => Some("jpg"),
        (mime::IMAGE, "png") => Some("png"),
        (mime::IMAGE, "webp") => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_avatar_types() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("image/png"), Some("png"));
        assert_eq!(extension_for_mime("image/webp"), Some("webp"));
        assert_eq!(extension_for_mime("image/gif"), None);
        assert_eq!(extension_for_mime("application/pdf"), None);
    }
}

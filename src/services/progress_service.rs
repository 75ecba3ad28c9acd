use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{CreateProgressRequest, ProgressEntry};

#[derive(Debug, Clone)]
pub struct ProgressService {
    db: PgPool,
}

impl ProgressService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        client_id: Uuid,
        request: CreateProgressRequest,
    ) -> Result<ProgressEntry, ApiError> {
        let entry = sqlx::query_as::<_, ProgressEntry>(
            "INSERT INTO progress_entries (id, client_id, recorded_on, weight_kg, measurements, notes, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, client_id, recorded_on, weight_kg, measurements, notes, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(request.recorded_on)
        .bind(request.weight_kg)
        .bind(&request.measurements)
        .bind(&request.notes)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(entry)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<ProgressEntry>, ApiError> {
        let entries = sqlx::query_as::<_, ProgressEntry>(
            "SELECT id, client_id, recorded_on, weight_kg, measurements, notes, created_at
             FROM progress_entries WHERE client_id = $1
             ORDER BY recorded_on DESC",
        )
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Progress as seen by the client's trainer; unlinked clients are a 404
    pub async fn list_for_trainer(
        &self,
        trainer_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<ProgressEntry>, ApiError> {
        let linked: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM trainer_clients
             WHERE trainer_id = $1 AND client_id = $2 AND status = 'active'",
        )
        .bind(trainer_id)
        .bind(client_id)
        .fetch_optional(&self.db)
        .await?;

        if linked.is_none() {
            return Err(ApiError::NotFound);
        }

        self.list_for_client(client_id).await
    }
}

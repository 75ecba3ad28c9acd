use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{TrainerDashboard, TrainerProfile, UpdateTrainerProfileRequest};

const PROFILE_COLUMNS: &str =
    "id, user_id, bio, specialties, hourly_rate, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct TrainerService {
    db: PgPool,
}

impl TrainerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<TrainerProfile, ApiError> {
        sqlx::query_as::<_, TrainerProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM trainer_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateTrainerProfileRequest,
    ) -> Result<TrainerProfile, ApiError> {
        let profile = sqlx::query_as::<_, TrainerProfile>(&format!(
            "UPDATE trainer_profiles
             SET bio = COALESCE($2, bio),
                 specialties = COALESCE($3, specialties),
                 hourly_rate = COALESCE($4, hourly_rate),
                 updated_at = $5
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(request.bio)
        .bind(request.specialties)
        .bind(request.hourly_rate)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        profile.ok_or(ApiError::NotFound)
    }

    /// Dashboard counters for the trainer home screen
    pub async fn dashboard(&self, trainer_id: Uuid) -> Result<TrainerDashboard, ApiError> {
        let (active_clients,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM trainer_clients WHERE trainer_id = $1 AND status = 'active'",
        )
        .bind(trainer_id)
        .fetch_one(&self.db)
        .await?;

        let (routines,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM routines WHERE trainer_id = $1")
                .bind(trainer_id)
                .fetch_one(&self.db)
                .await?;

        let (upcoming_appointments,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM appointments
             WHERE trainer_id = $1 AND status = 'scheduled' AND starts_at > $2",
        )
        .bind(trainer_id)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        let (pending_payments,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payments WHERE trainer_id = $1 AND status = 'pending'",
        )
        .bind(trainer_id)
        .fetch_one(&self.db)
        .await?;

        Ok(TrainerDashboard {
            active_clients,
            routines,
            upcoming_appointments,
            pending_payments,
        })
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::DifficultyLevel;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goals: Option<String>,
    pub level: Option<DifficultyLevel>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientProfileRequest {
    pub goals: Option<String>,
    pub level: Option<DifficultyLevel>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrainerProfileRequest {
    pub bio: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
}

/// Trainer to client relationship status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "link_status", rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerClient {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InviteClientRequest {
    pub client_email: String,
}

/// Joined view of a client as seen from a trainer's roster
#[derive(Debug, Serialize, FromRow)]
pub struct ClientSummary {
    pub client_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub goals: Option<String>,
    pub level: Option<DifficultyLevel>,
    pub link_status: LinkStatus,
    pub linked_at: DateTime<Utc>,
}

/// Dashboard counters for a trainer
#[derive(Debug, Serialize)]
pub struct TrainerDashboard {
    pub active_clients: i64,
    pub routines: i64,
    pub upcoming_appointments: i64,
    pub pending_payments: i64,
}

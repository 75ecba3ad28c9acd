use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Meal plan authored by a trainer, optionally assigned to one client
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutritionPlan {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Option<Uuid>,
    pub title: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNutritionPlanRequest {
    pub client_id: Option<Uuid>,
    pub title: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNutritionPlanRequest {
    pub client_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
}

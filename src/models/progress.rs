use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub client_id: Uuid,
    pub recorded_on: NaiveDate,
    pub weight_kg: Option<f64>,
    /// Free-form body measurements, e.g. {"waist_cm": 82.5}
    pub measurements: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProgressRequest {
    pub recorded_on: NaiveDate,
    pub weight_kg: Option<f64>,
    pub measurements: Option<serde_json::Value>,
    pub notes: Option<String>,
}

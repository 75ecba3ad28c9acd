use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{DifficultyLevel, Equipment};

/// Training objective driving prescription tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "training_objective", rename_all = "snake_case")]
pub enum TrainingObjective {
    Strength,
    Hypertrophy,
    Endurance,
    FatLoss,
    GeneralFitness,
}

/// A routine's content is a JSON document of days and prescriptions.
/// The generator emits this shape; trainers may also author it by hand.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Routine {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub objective: TrainingObjective,
    pub days_per_week: i16,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoutineRequest {
    pub name: String,
    pub description: Option<String>,
    pub objective: TrainingObjective,
    pub days_per_week: i16,
    pub content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoutineRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub objective: Option<TrainingObjective>,
    pub days_per_week: Option<i16>,
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineAssignment {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub client_id: Uuid,
    pub assigned_by: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoutineRequest {
    pub client_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
}

/// Request for the template-based routine generator
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRoutineRequest {
    pub name: Option<String>,
    pub objective: TrainingObjective,
    pub days_per_week: i16,
    pub level: DifficultyLevel,
    pub available_equipment: Vec<Equipment>,
}

/// Assignment joined with its routine, as served to clients
#[derive(Debug, Serialize, FromRow)]
pub struct AssignedRoutine {
    pub assignment_id: Uuid,
    pub routine_id: Uuid,
    pub name: String,
    pub objective: TrainingObjective,
    pub days_per_week: i16,
    pub content: serde_json::Value,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub active: bool,
}

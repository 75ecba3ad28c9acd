use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "muscle_group", rename_all = "snake_case")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Core,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "equipment", rename_all = "snake_case")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Machine,
    Cable,
    Bodyweight,
    Band,
}

impl sqlx::postgres::PgHasArrayType for Equipment {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_equipment")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "movement_pattern", rename_all = "snake_case")]
pub enum MovementPattern {
    Compound,
    Isolation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "difficulty_level", rename_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    /// Ordinal used for ranking by proximity to a client's level
    pub fn rank(&self) -> i32 {
        match self {
            DifficultyLevel::Beginner => 0,
            DifficultyLevel::Intermediate => 1,
            DifficultyLevel::Advanced => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub muscle_group: MuscleGroup,
    pub equipment: Equipment,
    pub movement_pattern: MovementPattern,
    pub difficulty: DifficultyLevel,
    pub instructions: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExerciseRequest {
    pub name: String,
    pub muscle_group: MuscleGroup,
    pub equipment: Equipment,
    pub movement_pattern: MovementPattern,
    pub difficulty: DifficultyLevel,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExerciseRequest {
    pub name: Option<String>,
    pub muscle_group: Option<MuscleGroup>,
    pub equipment: Option<Equipment>,
    pub movement_pattern: Option<MovementPattern>,
    pub difficulty: Option<DifficultyLevel>,
    pub instructions: Option<String>,
}

/// Query-string filters for the catalog listing
#[derive(Debug, Default, Deserialize)]
pub struct ExerciseFilter {
    pub muscle_group: Option<MuscleGroup>,
    pub equipment: Option<Equipment>,
    pub difficulty: Option<DifficultyLevel>,
    pub name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

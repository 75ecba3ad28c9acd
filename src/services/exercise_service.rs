use chrono::Utc;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{CreateExerciseRequest, Exercise, ExerciseFilter, UpdateExerciseRequest};

const EXERCISE_COLUMNS: &str = "id, name, muscle_group, equipment, movement_pattern, difficulty, \
                                instructions, created_by, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ExerciseService {
    db: PgPool,
}

impl ExerciseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        created_by: Uuid,
        request: CreateExerciseRequest,
    ) -> Result<Exercise, ApiError> {
        if request.name.trim().is_empty() {
            return Err(ApiError::BadRequest("exercise name is required".into()));
        }

        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "INSERT INTO exercises (id, name, muscle_group, equipment, movement_pattern, difficulty, instructions, created_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {EXERCISE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(request.muscle_group)
        .bind(request.equipment)
        .bind(request.movement_pattern)
        .bind(request.difficulty)
        .bind(&request.instructions)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(exercise)
    }

    pub async fn get(&self, id: Uuid) -> Result<Exercise, ApiError> {
        sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    /// List the catalog with optional filters
    pub async fn list(&self, filter: ExerciseFilter) -> Result<Vec<Exercise>, ApiError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE TRUE"
        ));

        if let Some(muscle_group) = filter.muscle_group {
            qb.push(" AND muscle_group = ").push_bind(muscle_group);
        }
        if let Some(equipment) = filter.equipment {
            qb.push(" AND equipment = ").push_bind(equipment);
        }
        if let Some(difficulty) = filter.difficulty {
            qb.push(" AND difficulty = ").push_bind(difficulty);
        }
        if let Some(name) = filter.name {
            qb.push(" AND name ILIKE ")
                .push_bind(format!("%{}%", name));
        }

        qb.push(" ORDER BY name")
            .push(" LIMIT ")
            .push_bind(filter.limit.unwrap_or(100).clamp(1, 500))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        let exercises = qb.build_query_as::<Exercise>().fetch_all(&self.db).await?;

        Ok(exercises)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateExerciseRequest,
    ) -> Result<Exercise, ApiError> {
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "UPDATE exercises
             SET name = COALESCE($2, name),
                 muscle_group = COALESCE($3, muscle_group),
                 equipment = COALESCE($4, equipment),
                 movement_pattern = COALESCE($5, movement_pattern),
                 difficulty = COALESCE($6, difficulty),
                 instructions = COALESCE($7, instructions),
                 updated_at = $8
             WHERE id = $1
             RETURNING {EXERCISE_COLUMNS}"
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.muscle_group)
        .bind(request.equipment)
        .bind(request.movement_pattern)
        .bind(request.difficulty)
        .bind(request.instructions)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        exercise.ok_or(ApiError::NotFound)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM exercises WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }
}

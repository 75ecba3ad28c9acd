use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{CreateNutritionPlanRequest, NutritionPlan, UpdateNutritionPlanRequest};

const PLAN_COLUMNS: &str = "id, trainer_id, client_id, title, content, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NutritionService {
    db: PgPool,
}

impl NutritionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        trainer_id: Uuid,
        request: CreateNutritionPlanRequest,
    ) -> Result<NutritionPlan, ApiError> {
        if request.title.trim().is_empty() {
            return Err(ApiError::BadRequest("plan title is required".into()));
        }

        let plan = sqlx::query_as::<_, NutritionPlan>(&format!(
            "INSERT INTO nutrition_plans (id, trainer_id, client_id, title, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(request.client_id)
        .bind(request.title.trim())
        .bind(&request.content)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(plan)
    }

    pub async fn list_for_trainer(&self, trainer_id: Uuid) -> Result<Vec<NutritionPlan>, ApiError> {
        let plans = sqlx::query_as::<_, NutritionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM nutrition_plans
             WHERE trainer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<NutritionPlan>, ApiError> {
        let plans = sqlx::query_as::<_, NutritionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM nutrition_plans
             WHERE client_id = $1 ORDER BY created_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn update(
        &self,
        trainer_id: Uuid,
        id: Uuid,
        request: UpdateNutritionPlanRequest,
    ) -> Result<NutritionPlan, ApiError> {
        let plan = sqlx::query_as::<_, NutritionPlan>(&format!(
            "UPDATE nutrition_plans
             SET client_id = COALESCE($3, client_id),
                 title = COALESCE($4, title),
                 content = COALESCE($5, content),
                 updated_at = $6
             WHERE id = $1 AND trainer_id = $2
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(id)
        .bind(trainer_id)
        .bind(request.client_id)
        .bind(request.title)
        .bind(request.content)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        plan.ok_or(ApiError::NotFound)
    }

    pub async fn delete(&self, trainer_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM nutrition_plans WHERE id = $1 AND trainer_id = $2")
            .bind(id)
            .bind(trainer_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }
}

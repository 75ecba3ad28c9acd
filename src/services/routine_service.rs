use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{
    AssignRoutineRequest, AssignedRoutine, CreateNotification, CreateRoutineRequest,
    NotificationPriority, NotificationType, Routine, RoutineAssignment, UpdateRoutineRequest,
};
use crate::services::NotificationService;

const ROUTINE_COLUMNS: &str =
    "id, trainer_id, name, description, objective, days_per_week, content, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct RoutineService {
    db: PgPool,
    notifications: NotificationService,
}

impl RoutineService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn create(
        &self,
        trainer_id: Uuid,
        request: CreateRoutineRequest,
    ) -> Result<Routine, ApiError> {
        if !(1..=7).contains(&request.days_per_week) {
            return Err(ApiError::BadRequest(
                "days_per_week must be between 1 and 7".into(),
            ));
        }

        let routine = sqlx::query_as::<_, Routine>(&format!(
            "INSERT INTO routines (id, trainer_id, name, description, objective, days_per_week, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {ROUTINE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.objective)
        .bind(request.days_per_week)
        .bind(&request.content)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(routine)
    }

    /// Fetch a routine; scoped by owning trainer
    pub async fn get(&self, trainer_id: Uuid, id: Uuid) -> Result<Routine, ApiError> {
        sqlx::query_as::<_, Routine>(&format!(
            "SELECT {ROUTINE_COLUMNS} FROM routines WHERE id = $1 AND trainer_id = $2"
        ))
        .bind(id)
        .bind(trainer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    pub async fn list(&self, trainer_id: Uuid) -> Result<Vec<Routine>, ApiError> {
        let routines = sqlx::query_as::<_, Routine>(&format!(
            "SELECT {ROUTINE_COLUMNS} FROM routines
             WHERE trainer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(routines)
    }

    pub async fn update(
        &self,
        trainer_id: Uuid,
        id: Uuid,
        request: UpdateRoutineRequest,
    ) -> Result<Routine, ApiError> {
        let routine = sqlx::query_as::<_, Routine>(&format!(
            "UPDATE routines
             SET name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 objective = COALESCE($5, objective),
                 days_per_week = COALESCE($6, days_per_week),
                 content = COALESCE($7, content),
                 updated_at = $8
             WHERE id = $1 AND trainer_id = $2
             RETURNING {ROUTINE_COLUMNS}"
        ))
        .bind(id)
        .bind(trainer_id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.objective)
        .bind(request.days_per_week)
        .bind(request.content)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        routine.ok_or(ApiError::NotFound)
    }

    pub async fn delete(&self, trainer_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM routines WHERE id = $1 AND trainer_id = $2")
            .bind(id)
            .bind(trainer_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }

        Ok(())
    }

    /// Assign a routine to a client.
    ///
    /// A client has at most one active assignment: any currently active one is
    /// deactivated in the same transaction that inserts the new link, and the
    /// client is notified.
    pub async fn assign(
        &self,
        trainer_id: Uuid,
        routine_id: Uuid,
        request: AssignRoutineRequest,
    ) -> Result<RoutineAssignment, ApiError> {
        let routine = self.get(trainer_id, routine_id).await?;

        let linked: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM trainer_clients
             WHERE trainer_id = $1 AND client_id = $2 AND status = 'active'",
        )
        .bind(trainer_id)
        .bind(request.client_id)
        .fetch_optional(&self.db)
        .await?;

        if linked.is_none() {
            return Err(ApiError::NotFound);
        }

        if let Some(ends_on) = request.ends_on {
            if ends_on < request.starts_on {
                return Err(ApiError::BadRequest(
                    "assignment cannot end before it starts".into(),
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "UPDATE routine_assignments SET active = FALSE
             WHERE client_id = $1 AND active = TRUE",
        )
        .bind(request.client_id)
        .execute(&mut *tx)
        .await?;

        let assignment = sqlx::query_as::<_, RoutineAssignment>(
            "INSERT INTO routine_assignments (id, routine_id, client_id, assigned_by, starts_on, ends_on, active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
             RETURNING id, routine_id, client_id, assigned_by, starts_on, ends_on, active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(routine_id)
        .bind(request.client_id)
        .bind(trainer_id)
        .bind(request.starts_on)
        .bind(request.ends_on)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        self.notifications
            .notify_in_tx(
                &mut tx,
                CreateNotification {
                    user_id: request.client_id,
                    notification_type: NotificationType::RoutineAssigned,
                    priority: NotificationPriority::Medium,
                    title: "New routine assigned".to_string(),
                    body: format!("Your trainer assigned you the routine \"{}\"", routine.name),
                    data: Some(serde_json::json!({
                        "routine_id": routine_id,
                        "assignment_id": assignment.id,
                    })),
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            "assigned routine {} to client {} by trainer {}",
            routine_id, request.client_id, trainer_id
        );

        Ok(assignment)
    }

    /// Routines as seen by a client: only their own assignments
    pub async fn list_assigned(&self, client_id: Uuid) -> Result<Vec<AssignedRoutine>, ApiError> {
        let routines = sqlx::query_as::<_, AssignedRoutine>(
            "SELECT a.id AS assignment_id, r.id AS routine_id, r.name, r.objective,
                    r.days_per_week, r.content, a.starts_on, a.ends_on, a.active
             FROM routine_assignments a
             JOIN routines r ON r.id = a.routine_id
             WHERE a.client_id = $1
             ORDER BY a.created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(routines)
    }

    /// The client's active assignment, if any
    pub async fn active_assignment(
        &self,
        client_id: Uuid,
    ) -> Result<Option<AssignedRoutine>, ApiError> {
        let routine = sqlx::query_as::<_, AssignedRoutine>(
            "SELECT a.id AS assignment_id, r.id AS routine_id, r.name, r.objective,
                    r.days_per_week, r.content, a.starts_on, a.ends_on, a.active
             FROM routine_assignments a
             JOIN routines r ON r.id = a.routine_id
             WHERE a.client_id = $1 AND a.active = TRUE",
        )
        .bind(client_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(routine)
    }

    /// Human-readable summary of today's training day, used by the bot
    pub async fn todays_day_summary(&self, client_id: Uuid) -> Result<Option<String>, ApiError> {
        let Some(assigned) = self.active_assignment(client_id).await? else {
            return Ok(None);
        };

        let elapsed_days = (Utc::now().date_naive() - assigned.starts_on).num_days();

        Ok(summarize_day(&assigned.name, &assigned.content, elapsed_days))
    }
}

/// Pick today's day from the routine content by rotating through the days
/// since the assignment started, and render a short text summary.
pub fn summarize_day(
    routine_name: &str,
    content: &serde_json::Value,
    elapsed_days: i64,
) -> Option<String> {
    let days = content.get("days")?.as_array()?;
    if days.is_empty() || elapsed_days < 0 {
        return None;
    }

    let day = &days[(elapsed_days as usize) % days.len()];
    let day_name = day.get("name").and_then(|n| n.as_str()).unwrap_or("Training");

    let mut lines = vec![format!("{routine_name} - {day_name}")];
    if let Some(exercises) = day.get("exercises").and_then(|e| e.as_array()) {
        for exercise in exercises {
            let name = exercise.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            let sets = exercise.get("sets").and_then(|s| s.as_u64()).unwrap_or(0);
            let rep_min = exercise.get("rep_min").and_then(|r| r.as_u64()).unwrap_or(0);
            let rep_max = exercise.get("rep_max").and_then(|r| r.as_u64()).unwrap_or(0);
            lines.push(format!("- {name}: {sets}x{rep_min}-{rep_max}"));
        }
    }

    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content() -> serde_json::Value {
        json!({
            "days": [
                {
                    "name": "Push",
                    "exercises": [
                        {"name": "Bench Press", "sets": 4, "rep_min": 8, "rep_max": 12}
                    ]
                },
                {
                    "name": "Pull",
                    "exercises": [
                        {"name": "Barbell Row", "sets": 4, "rep_min": 8, "rep_max": 12}
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_day_rotation() {
        let c = content();

        let day0 = summarize_day("Plan", &c, 0).unwrap();
        let day1 = summarize_day("Plan", &c, 1).unwrap();
        let day2 = summarize_day("Plan", &c, 2).unwrap();

        assert!(day0.contains("Push"));
        assert!(day1.contains("Pull"));
        assert!(day2.contains("Push"));
    }

    #[test]
    fn test_summary_lists_prescriptions() {
        let summary = summarize_day("Plan", &content(), 0).unwrap();

        assert!(summary.contains("Bench Press: 4x8-12"));
    }

    #[test]
    fn test_empty_or_malformed_content() {
        assert!(summarize_day("Plan", &json!({}), 0).is_none());
        assert!(summarize_day("Plan", &json!({"days": []}), 0).is_none());
        assert!(summarize_day("Plan", &content(), -1).is_none());
    }
}

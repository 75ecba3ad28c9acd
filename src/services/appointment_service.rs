use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{
    Appointment, AppointmentStatus, CreateAppointmentRequest, CreateNotification,
    NotificationPriority, NotificationType, UpdateAppointmentRequest,
};
use crate::services::NotificationService;

const APPOINTMENT_COLUMNS: &str = "id, trainer_id, client_id, starts_at, ends_at, location, \
                                   notes, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AppointmentService {
    db: PgPool,
    notifications: NotificationService,
}

impl AppointmentService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Schedule an appointment. A trainer cannot hold two overlapping
    /// scheduled appointments.
    pub async fn create(
        &self,
        trainer_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, ApiError> {
        if request.ends_at <= request.starts_at {
            return Err(ApiError::BadRequest(
                "appointment must end after it starts".into(),
            ));
        }

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

        if self
            .has_overlap(trainer_id, request.starts_at, request.ends_at, None)
            .await?
        {
            return Err(ApiError::Conflict(
                "the trainer already has an appointment in this slot".into(),
            ));
        }

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "INSERT INTO appointments (id, trainer_id, client_id, starts_at, ends_at, location, notes, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled', $8, $8)
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(request.client_id)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(&request.location)
        .bind(&request.notes)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        self.notifications
            .notify(CreateNotification {
                user_id: request.client_id,
                notification_type: NotificationType::AppointmentScheduled,
                priority: NotificationPriority::Medium,
                title: "Session scheduled".to_string(),
                body: format!(
                    "Your trainer scheduled a session on {}",
                    appointment.starts_at.format("%Y-%m-%d %H:%M UTC")
                ),
                data: Some(serde_json::json!({ "appointment_id": appointment.id })),
            })
            .await?;

        Ok(appointment)
    }

    pub async fn list_for_trainer(&self, trainer_id: Uuid) -> Result<Vec<Appointment>, ApiError> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE trainer_id = $1 ORDER BY starts_at DESC"
        ))
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(appointments)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, ApiError> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE client_id = $1 ORDER BY starts_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(appointments)
    }

    /// The client's next scheduled appointment, used by the bot
    pub async fn next_for_client(&self, client_id: Uuid) -> Result<Option<Appointment>, ApiError> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE client_id = $1 AND status = 'scheduled' AND starts_at > $2
             ORDER BY starts_at ASC LIMIT 1"
        ))
        .bind(client_id)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        Ok(appointment)
    }

    pub async fn update(
        &self,
        trainer_id: Uuid,
        id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, ApiError> {
        let current = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1 AND trainer_id = $2"
        ))
        .bind(id)
        .bind(trainer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)?;

        let starts_at = request.starts_at.unwrap_or(current.starts_at);
        let ends_at = request.ends_at.unwrap_or(current.ends_at);
        let status = request.status.unwrap_or(current.status);

        if ends_at <= starts_at {
            return Err(ApiError::BadRequest(
                "appointment must end after it starts".into(),
            ));
        }

        // Re-check the slot when a scheduled appointment moves
        if status == AppointmentStatus::Scheduled
            && self
                .has_overlap(trainer_id, starts_at, ends_at, Some(id))
                .await?
        {
            return Err(ApiError::Conflict(
                "the trainer already has an appointment in this slot".into(),
            ));
        }

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments
             SET starts_at = $3, ends_at = $4, location = COALESCE($5, location),
                 notes = COALESCE($6, notes), status = $7, updated_at = $8
             WHERE id = $1 AND trainer_id = $2
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(trainer_id)
        .bind(starts_at)
        .bind(ends_at)
        .bind(request.location)
        .bind(request.notes)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        appointment.ok_or(ApiError::NotFound)
    }

    pub async fn cancel(&self, trainer_id: Uuid, id: Uuid) -> Result<Appointment, ApiError> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET status = 'cancelled', updated_at = $3
             WHERE id = $1 AND trainer_id = $2 AND status = 'scheduled'
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(trainer_id)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        appointment.ok_or(ApiError::NotFound)
    }

    /// Appointments starting within the next 24 hours, for the daily
    /// reminder pass
    pub async fn due_within_next_day(&self) -> Result<Vec<Appointment>, ApiError> {
        let now = Utc::now();
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE status = 'scheduled' AND starts_at > $1 AND starts_at <= $2
             ORDER BY starts_at"
        ))
        .bind(now)
        .bind(now + Duration::hours(24))
        .fetch_all(&self.db)
        .await?;

        Ok(appointments)
    }

    async fn has_overlap(
        &self,
        trainer_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, ApiError> {
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT starts_at, ends_at FROM appointments
             WHERE trainer_id = $1 AND status = 'scheduled' AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(trainer_id)
        .bind(exclude)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .any(|(other_start, other_end)| overlaps(starts_at, ends_at, *other_start, *other_end)))
    }
}

/// Half-open interval overlap: [a_start, a_end) intersects [b_start, b_end)
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_overlapping_intervals() {
        assert!(overlaps(at(9), at(10), at(9), at(10)));
        assert!(overlaps(at(9), at(11), at(10), at(12)));
        assert!(overlaps(at(10), at(12), at(9), at(11)));
        assert!(overlaps(at(9), at(12), at(10), at(11)));
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        // Back-to-back sessions share an instant but not a slot
        assert!(!overlaps(at(9), at(10), at(10), at(11)));
        assert!(!overlaps(at(10), at(11), at(9), at(10)));
    }

    #[test]
    fn test_disjoint_intervals() {
        assert!(!overlaps(at(9), at(10), at(14), at(15)));
    }
}

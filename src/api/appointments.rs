use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserRole, UserSession};
use crate::models::{Appointment, CreateAppointmentRequest, UpdateAppointmentRequest};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/", post(create_appointment))
        .route("/:id", put(update_appointment))
        .route("/:id/cancel", put(cancel_appointment))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/", get(list_appointments))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

/// Schedule an appointment. Overlapping trainer slots are a 409.
#[tracing::instrument(skip(state, session, request))]
async fn create_appointment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state.appointments.create(session.user_id, request).await?;
    Ok(Json(appointment))
}

/// Appointments visible to the caller
#[tracing::instrument(skip(state, session))]
async fn list_appointments(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments = match session.role {
        UserRole::Client => state.appointments.list_for_client(session.user_id).await?,
        UserRole::Trainer | UserRole::Admin => {
            state.appointments.list_for_trainer(session.user_id).await?
        }
    };
    Ok(Json(appointments))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_appointment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state
        .appointments
        .update(session.user_id, id, request)
        .await?;
    Ok(Json(appointment))
}

#[tracing::instrument(skip(state, session))]
async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state.appointments.cancel(session.user_id, id).await?;
    Ok(Json(appointment))
}

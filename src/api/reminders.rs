use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{CreateReminderRequest, Reminder};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/", get(list_reminders).post(create_reminder))
        .route("/:id/cancel", put(cancel_reminder))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session, request))]
async fn create_reminder(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = state.reminders.create(session.user_id, request).await?;
    Ok(Json(reminder))
}

#[tracing::instrument(skip(state, session))]
async fn list_reminders(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    let reminders = state.reminders.list_for_owner(session.user_id).await?;
    Ok(Json(reminders))
}

#[tracing::instrument(skip(state, session))]
async fn cancel_reminder(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = state.reminders.cancel(session.user_id, id).await?;
    Ok(Json(reminder))
}

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{TrainerDashboard, TrainerProfile, UpdateTrainerProfileRequest};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/profile", get(my_profile).put(update_my_profile))
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session))]
async fn my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<TrainerProfile>, ApiError> {
    let profile = state.trainers.get_profile(session.user_id).await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateTrainerProfileRequest>,
) -> Result<Json<TrainerProfile>, ApiError> {
    let profile = state
        .trainers
        .update_profile(session.user_id, request)
        .await?;
    Ok(Json(profile))
}

/// Counters for the trainer home screen
#[tracing::instrument(skip(state, session))]
async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<TrainerDashboard>, ApiError> {
    let dashboard = state.trainers.dashboard(session.user_id).await?;
    Ok(Json(dashboard))
}

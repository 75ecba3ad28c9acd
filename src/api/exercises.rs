use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{CreateExerciseRequest, Exercise, ExerciseFilter, UpdateExerciseRequest};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let write_routes = Router::new()
        .route("/", post(create_exercise))
        .route("/:id", axum::routing::put(update_exercise).delete(delete_exercise))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/", get(list_exercises))
        .route("/:id", get(get_exercise))
        .merge(write_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

/// List the catalog with optional filters
#[tracing::instrument(skip(state))]
async fn list_exercises(
    State(state): State<AppState>,
    Query(filter): Query<ExerciseFilter>,
) -> Result<Json<Vec<Exercise>>, ApiError> {
    let exercises = state.exercises.list(filter).await?;
    Ok(Json(exercises))
}

#[tracing::instrument(skip(state))]
async fn get_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Exercise>, ApiError> {
    let exercise = state.exercises.get(id).await?;
    Ok(Json(exercise))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_exercise(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateExerciseRequest>,
) -> Result<Json<Exercise>, ApiError> {
    let exercise = state.exercises.create(session.user_id, request).await?;
    Ok(Json(exercise))
}

#[tracing::instrument(skip(state, request))]
async fn update_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateExerciseRequest>,
) -> Result<Json<Exercise>, ApiError> {
    let exercise = state.exercises.update(id, request).await?;
    Ok(Json(exercise))
}

#[tracing::instrument(skip(state))]
async fn delete_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.exercises.delete(id).await?;
    Ok(Json(json!({ "success": true, "message": "Exercise deleted" })))
}

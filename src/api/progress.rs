use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{CreateProgressRequest, ProgressEntry};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/clients/:client_id", get(client_progress))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/", get(my_progress).post(log_progress))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

/// Log a progress entry for the authenticated client
#[tracing::instrument(skip(state, session, request))]
async fn log_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateProgressRequest>,
) -> Result<Json<ProgressEntry>, ApiError> {
    let entry = state.progress.create(session.user_id, request).await?;
    Ok(Json(entry))
}

#[tracing::instrument(skip(state, session))]
async fn my_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<ProgressEntry>>, ApiError> {
    let entries = state.progress.list_for_client(session.user_id).await?;
    Ok(Json(entries))
}

/// A linked client's progress, as their trainer
#[tracing::instrument(skip(state, session))]
async fn client_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<ProgressEntry>>, ApiError> {
    let entries = state
        .progress
        .list_for_trainer(session.user_id, client_id)
        .await?;
    Ok(Json(entries))
}

use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{
    AssignRoutineRequest, AssignedRoutine, CreateRoutineRequest, GenerateRoutineRequest, Routine,
    RoutineAssignment, UpdateRoutineRequest,
};
use crate::services::EmailKind;

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/", get(list_routines).post(create_routine))
        .route("/generate", post(generate_routine))
        .route(
            "/:id",
            get(get_routine).put(update_routine).delete(delete_routine),
        )
        .route("/:id/assign", post(assign_routine))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/assigned", get(list_assigned))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session))]
async fn list_routines(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<Routine>>, ApiError> {
    let routines = state.routines.list(session.user_id).await?;
    Ok(Json(routines))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateRoutineRequest>,
) -> Result<Json<Routine>, ApiError> {
    let routine = state.routines.create(session.user_id, request).await?;
    Ok(Json(routine))
}

/// Generate a routine from the objective/split rule tables
#[tracing::instrument(skip(state, session, request))]
async fn generate_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<GenerateRoutineRequest>,
) -> Result<Json<Routine>, ApiError> {
    let routine = state.generator.generate(session.user_id, request).await?;
    Ok(Json(routine))
}

#[tracing::instrument(skip(state, session))]
async fn get_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Routine>, ApiError> {
    let routine = state.routines.get(session.user_id, id).await?;
    Ok(Json(routine))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoutineRequest>,
) -> Result<Json<Routine>, ApiError> {
    let routine = state.routines.update(session.user_id, id, request).await?;
    Ok(Json(routine))
}

#[tracing::instrument(skip(state, session))]
async fn delete_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.routines.delete(session.user_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Routine deleted" })))
}

/// Assign a routine to a client and mail them about it
#[tracing::instrument(skip(state, session, request))]
async fn assign_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRoutineRequest>,
) -> Result<Json<RoutineAssignment>, ApiError> {
    let routine = state.routines.get(session.user_id, id).await?;
    let client_id = request.client_id;
    let assignment = state.routines.assign(session.user_id, id, request).await?;

    if let Ok(Some(client)) = state.auth.get_user_by_id(client_id).await {
        let email = state.email.clone();
        let routine_name = routine.name.clone();
        tokio::spawn(async move {
            if let Err(e) = email
                .send(
                    &client.email,
                    &client.full_name,
                    EmailKind::RoutineAssigned,
                    &[
                        ("user_name", client.full_name.as_str()),
                        ("routine_name", routine_name.as_str()),
                    ],
                )
                .await
            {
                error!("routine assignment email to {} failed: {e}", client.email);
            }
        });
    }

    Ok(Json(assignment))
}

/// Routines assigned to the authenticated client
#[tracing::instrument(skip(state, session))]
async fn list_assigned(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<AssignedRoutine>>, ApiError> {
    let routines = state.routines.list_assigned(session.user_id).await?;
    Ok(Json(routines))
}

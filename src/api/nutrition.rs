use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserRole, UserSession};
use crate::models::{CreateNutritionPlanRequest, NutritionPlan, UpdateNutritionPlanRequest};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/:id", axum::routing::put(update_plan).delete(delete_plan))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session, request))]
async fn create_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateNutritionPlanRequest>,
) -> Result<Json<NutritionPlan>, ApiError> {
    if !matches!(session.role, UserRole::Trainer | UserRole::Admin) {
        return Err(ApiError::Forbidden);
    }
    let plan = state.nutrition.create(session.user_id, request).await?;
    Ok(Json(plan))
}

/// Plans visible to the caller: authored plans for trainers, assigned plans
/// for clients
#[tracing::instrument(skip(state, session))]
async fn list_plans(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<NutritionPlan>>, ApiError> {
    let plans = match session.role {
        UserRole::Client => state.nutrition.list_for_client(session.user_id).await?,
        UserRole::Trainer | UserRole::Admin => {
            state.nutrition.list_for_trainer(session.user_id).await?
        }
    };
    Ok(Json(plans))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateNutritionPlanRequest>,
) -> Result<Json<NutritionPlan>, ApiError> {
    let plan = state.nutrition.update(session.user_id, id, request).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, session))]
async fn delete_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.nutrition.delete(session.user_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Plan deleted" })))
}

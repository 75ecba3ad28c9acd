use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::models::{Notification, NotificationQuery, UnreadCount};

pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", put(mark_read))
        .route("/read-all", put(mark_all_read))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session))]
async fn list_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state.notifications.list(session.user_id, query).await?;
    Ok(Json(notifications))
}

#[tracing::instrument(skip(state, session))]
async fn unread_count(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UnreadCount>, ApiError> {
    let count = state.notifications.unread_count(session.user_id).await?;
    Ok(Json(count))
}

#[tracing::instrument(skip(state, session))]
async fn mark_read(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state.notifications.mark_read(session.user_id, id).await?;
    Ok(Json(notification))
}

#[tracing::instrument(skip(state, session))]
async fn mark_all_read(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Value>, ApiError> {
    let updated = state.notifications.mark_all_read(session.user_id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

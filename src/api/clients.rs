use axum::{
    extract::{Multipart, Path, State},
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{jwt_auth_middleware, trainer_or_admin_middleware, UserSession};
use crate::models::{
    ClientProfile, ClientSummary, InviteClientRequest, TrainerClient, UpdateClientProfileRequest,
};

/// Client-facing and roster-management routes
pub fn routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    let trainer_routes = Router::new()
        .route("/", get(list_clients))
        .route("/invite", post(invite_client))
        .route("/:client_id", get(get_client).delete(detach_client))
        .route_layer(middleware::from_fn(trainer_or_admin_middleware));

    Router::new()
        .route("/me/profile", get(my_profile).put(update_my_profile))
        .route("/me/avatar", post(upload_avatar))
        .route("/invitations/:link_id/accept", put(accept_invitation))
        .merge(trainer_routes)
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

/// Get the authenticated client's profile
#[tracing::instrument(skip(state, session))]
async fn my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<ClientProfile>, ApiError> {
    let profile = state.clients.get_profile(session.user_id).await?;
    Ok(Json(profile))
}

/// Update the authenticated client's profile
#[tracing::instrument(skip(state, session, request))]
async fn update_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateClientProfileRequest>,
) -> Result<Json<ClientProfile>, ApiError> {
    let profile = state.clients.update_profile(session.user_id, request).await?;
    Ok(Json(profile))
}

/// Upload a profile image (multipart field "avatar")
#[tracing::instrument(skip(state, session, multipart))]
async fn upload_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| ApiError::BadRequest("avatar field needs a content type".into()))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read avatar: {e}")))?;

        let path = state
            .clients
            .save_avatar(
                session.user_id,
                &state.config.upload_dir,
                &content_type,
                &bytes,
            )
            .await?;

        return Ok(Json(json!({ "success": true, "avatar_path": path })));
    }

    Err(ApiError::BadRequest(
        "multipart field \"avatar\" is required".into(),
    ))
}

/// Accept a pending trainer invitation
#[tracing::instrument(skip(state, session))]
async fn accept_invitation(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(link_id): Path<Uuid>,
) -> Result<Json<TrainerClient>, ApiError> {
    let link = state.clients.accept_invite(session.user_id, link_id).await?;
    Ok(Json(link))
}

/// List the trainer's roster
#[tracing::instrument(skip(state, session))]
async fn list_clients(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<ClientSummary>>, ApiError> {
    let clients = state.clients.list_clients(session.user_id).await?;
    Ok(Json(clients))
}

/// Invite a client by email
#[tracing::instrument(skip(state, session, request))]
async fn invite_client(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<InviteClientRequest>,
) -> Result<Json<TrainerClient>, ApiError> {
    let link = state
        .clients
        .invite_client(session.user_id, &request.client_email)
        .await?;
    Ok(Json(link))
}

/// Fetch one linked client's profile
#[tracing::instrument(skip(state, session))]
async fn get_client(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<ClientProfile>, ApiError> {
    let profile = state
        .clients
        .get_client_for_trainer(session.user_id, client_id)
        .await?;
    Ok(Json(profile))
}

/// Deactivate a trainer-client link
#[tracing::instrument(skip(state, session))]
async fn detach_client(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state
        .clients
        .detach_client(session.user_id, client_id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Client detached" })))
}

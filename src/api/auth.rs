use axum::{
    extract::{Path, Query, Request, State},
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use tracing::error;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{
    extract_bearer_token, jwt_auth_middleware, AuthError, AuthResponse, ChangePasswordRequest,
    ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, TokenResponse, UserInfo, UserRole, UserSession,
};
use crate::services::EmailKind;

/// Authentication routes
pub fn auth_routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route(
            "/profile",
            get(get_profile).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .route(
            "/change-password",
            post(change_password).route_layer(middleware::from_fn_with_state(
                auth_service,
                jwt_auth_middleware,
            )),
        )
        .with_state(state)
}

/// Register a new user
#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth.register(request).await?;

    // The welcome mail must never block or fail registration
    let email = state.email.clone();
    let user_email = response.user.email.clone();
    let user_name = response.user.full_name.clone();
    let app_url = state.config.public_url.clone();
    tokio::spawn(async move {
        if let Err(e) = email
            .send(
                &user_email,
                &user_name,
                EmailKind::Welcome,
                &[("user_name", user_name.as_str()), ("app_url", app_url.as_str())],
            )
            .await
        {
            error!("welcome email to {user_email} failed: {e}");
        }
    });

    Ok(Json(response))
}

/// Login user
#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth.login(request).await?;
    Ok(Json(response))
}

/// Refresh access token
#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = state.auth.refresh_token(request).await?;
    Ok(Json(response))
}

/// Logout user
#[tracing::instrument(skip(state, request))]
async fn logout(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<MessageResponse>, AuthError> {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let response = state.auth.logout(token).await?;
    Ok(Json(response))
}

/// Start the forgot-password flow. Always answers the same message so the
/// endpoint cannot be used to probe for accounts.
#[tracing::instrument(skip(state, request))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    if let Some((user, token)) = state.auth.forgot_password(&request.email).await? {
        let email = state.email.clone();
        let reset_url = format!("{}/reset-password?token={token}", state.config.public_url);
        tokio::spawn(async move {
            if let Err(e) = email
                .send(
                    &user.email,
                    &user.full_name,
                    EmailKind::PasswordReset,
                    &[
                        ("user_name", user.full_name.as_str()),
                        ("reset_url", reset_url.as_str()),
                    ],
                )
                .await
            {
                error!("password reset email to {} failed: {e}", user.email);
            }
        });
    }

    Ok(Json(MessageResponse::ok(
        "If an account with that email exists, a password reset link has been sent.",
    )))
}

/// Complete the forgot-password flow
#[tracing::instrument(skip(state, request))]
async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = state.auth.reset_password(request).await?;
    Ok(Json(response))
}

/// Get the authenticated user's account info
#[tracing::instrument(skip(state, session))]
async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UserInfo>, AuthError> {
    let user_info = state.auth.me(session.user_id).await?;
    Ok(Json(user_info))
}

/// Change the authenticated user's password
#[tracing::instrument(skip(state, session, request))]
async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = state.auth.change_password(session.user_id, request).await?;
    Ok(Json(response))
}

/// Admin endpoints
pub fn admin_routes(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/role", put(update_user_role))
        .route("/users/:id", delete(delete_user))
        .route_layer(middleware::from_fn(crate::auth::admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// List all users (admin only)
#[tracing::instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserInfo>>, ApiError> {
    let users = state.users.list_users(params.limit, params.offset).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
struct UpdateRoleRequest {
    role: UserRole,
}

/// Update user role (admin only)
#[tracing::instrument(skip(state))]
async fn update_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.users.update_role(user_id, request.role).await?;
    Ok(Json(MessageResponse::ok("User role updated successfully")))
}

/// Delete a user account (admin only)
#[tracing::instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.users.delete_user(user_id).await?;
    Ok(Json(MessageResponse::ok("User deleted successfully")))
}

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health::health_check;
use super::state::AppState;
use crate::auth::cors_layer;

/// Assemble the full application router
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", super::auth::auth_routes(state.clone()))
        .nest("/api/admin", super::auth::admin_routes(state.clone()))
        .nest("/api/clients", super::clients::routes(state.clone()))
        .nest("/api/trainer", super::trainers::routes(state.clone()))
        .nest("/api/exercises", super::exercises::routes(state.clone()))
        .nest("/api/routines", super::routines::routes(state.clone()))
        .nest("/api/payments", super::payments::routes(state.clone()))
        .nest(
            "/api/appointments",
            super::appointments::routes(state.clone()),
        )
        .nest("/api/reminders", super::reminders::routes(state.clone()))
        .nest(
            "/api/notifications",
            super::notifications::routes(state.clone()),
        )
        .nest("/api/progress", super::progress::routes(state.clone()))
        .nest("/api/nutrition", super::nutrition::routes(state.clone()))
        .nest("/api/whatsapp", super::whatsapp::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

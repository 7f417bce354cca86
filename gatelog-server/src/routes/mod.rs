use axum::{
    Router,
    routing::{any, get, post},
};

use crate::handlers::{health, logs, users};
use crate::infra::app_state::AppState;

/// Routes mounted under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/users", users_router())
        .nest("/logs", logs_router())
        // Login is not offered; keep the prefix answering with a clear 404.
        .route("/auth", any(health::auth_disabled_handler))
        .route("/auth/{*rest}", any(health::auth_disabled_handler))
}

fn users_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route("/by-id/{id_number}", get(users::get_user_by_badge_handler))
        .route(
            "/{id}",
            get(users::get_user_handler)
                .patch(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
}

fn logs_router() -> Router<AppState> {
    Router::new()
        .route("/", get(logs::list_logs_handler))
        .route("/scan", post(logs::scan_handler))
        .route("/{id}", get(logs::get_log_handler))
}

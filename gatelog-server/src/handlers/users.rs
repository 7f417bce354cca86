use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use gatelog_core::{CredentialHasher, RecordStore};
use gatelog_model::{NewUser, User, UserRole, UserUpdate};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

const USER_NOT_FOUND: &str = "User not found.";
const DUPLICATE_BADGE: &str = "User with this ID number already exists.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub id_number: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

pub async fn list_users_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.store.list_users().await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    state
        .store
        .get_user_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
}

/// Badge lookup used by scanner tooling.
pub async fn get_user_by_badge_handler(
    State(state): State<AppState>,
    Path(id_number): Path<String>,
) -> AppResult<Json<User>> {
    state
        .store
        .get_user_by_badge(&id_number)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
}

/// Provision a user.
///
/// `name`, `idNumber` and `role` are required; `role` is one of
/// `admin`, `user`, `guard`, `staff`. Badges are unique regardless of case.
pub async fn create_user_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let Json(request) = payload?;
    let (Some(name), Some(id_number), Some(role)) = (
        non_blank(request.name),
        non_blank(request.id_number),
        non_blank(request.role),
    ) else {
        return Err(AppError::bad_request(
            "Name, idNumber, and role are required.",
        ));
    };
    let role: UserRole = role.parse()?;

    if state.store.get_user_by_badge(&id_number).await?.is_some() {
        return Err(AppError::bad_request(DUPLICATE_BADGE));
    }

    let user = state
        .store
        .create_user(NewUser::new(name, id_number, role))
        .await?;
    info!(user_id = %user.id, badge = %user.id_number, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Partial update of name, role and password.
///
/// A password shorter than six characters is ignored. The stored hash is
/// never returned.
pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let Json(request) = payload?;

    let mut update = UserUpdate::default();
    if let Some(name) = request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("Name must not be empty."));
        }
        update.name = Some(name.to_string());
    }
    if let Some(role) = request.role {
        update.role = Some(role.parse()?);
    }
    if let Some(password) = request.password
        && CredentialHasher::accepts(&password)
    {
        update.password_hash =
            Some(hash_password(state.credentials.clone(), password).await?);
    }

    state
        .store
        .update_user(&id, update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    match state.store.delete_user(&id).await? {
        Some(user) => {
            info!(user_id = %user.id, badge = %user.id_number, "user deleted");
            Ok(Json(json!({ "message": "User deleted." })))
        }
        None => Err(AppError::not_found(USER_NOT_FOUND)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn hash_password(
    hasher: Arc<CredentialHasher>,
    password: String,
) -> AppResult<String> {
    let hashed =
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|err| AppError::internal(err.to_string()))??;
    Ok(hashed)
}

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{create_auth_token, revoke_auth_token, AuthUser};
use crate::error::{AppError, AppResult};
use crate::handlers::JsonBody;
use crate::models::User;
use crate::state::AppState;
use crate::users::{self, LoginUser, RegisterUser};

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken {
    pub user: User,
    pub token: String,
}

pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(user_data): JsonBody<RegisterUser>,
) -> AppResult<impl IntoResponse> {
    let user = users::register(&state.db, &user_data, state.config.bcrypt_cost).await?;
    let token = create_auth_token(&*state.db.lock().await, &user.id)?;

    tracing::info!(user_id = %user.id, "Registered user");
    Ok((StatusCode::CREATED, Json(AuthToken { user, token })))
}

pub async fn login_user(
    State(state): State<AppState>,
    JsonBody(login_data): JsonBody<LoginUser>,
) -> AppResult<Json<AuthToken>> {
    let user = users::authenticate(&state.db, &login_data).await?;
    let token = create_auth_token(&*state.db.lock().await, &user.id)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthToken { user, token }))
}

pub async fn logout_user(State(state): State<AppState>, caller: AuthUser) -> AppResult<impl IntoResponse> {
    revoke_auth_token(&*state.db.lock().await, &caller.token)?;

    tracing::info!(user_id = %caller.id, "User logged out");
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

pub async fn current_user(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<User>> {
    let user = users::find(&*state.db.lock().await, &caller.id)?.ok_or(AppError::Unauthenticated)?;
    Ok(Json(user))
}

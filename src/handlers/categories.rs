use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::categories::{self, CategoryInput};
use crate::error::AppResult;
use crate::handlers::JsonBody;
use crate::models::{Category, CategoryDetail, CategoryWithCount};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategorySearch {
    pub search: Option<String>,
}

pub async fn list_categories(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(params): Query<CategorySearch>,
) -> AppResult<Json<Vec<CategoryWithCount>>> {
    let categories = categories::list(&*state.db.lock().await, params.search.as_deref())?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(input): JsonBody<CategoryInput>,
) -> AppResult<impl IntoResponse> {
    let category = categories::create(&*state.db.lock().await, &input)?;

    tracing::info!(category_id = category.id, user_id = %caller.id, "Created category");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn show_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(category_id): Path<i64>,
) -> AppResult<Json<CategoryDetail>> {
    let detail = categories::show(&*state.db.lock().await, category_id, &caller.id)?;
    Ok(Json(detail))
}

pub async fn update_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(category_id): Path<i64>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> AppResult<Json<Category>> {
    let category = categories::update(&*state.db.lock().await, category_id, &input)?;

    tracing::info!(category_id, user_id = %caller.id, "Updated category");
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(category_id): Path<i64>,
) -> AppResult<StatusCode> {
    categories::delete(&*state.db.lock().await, category_id)?;

    tracing::info!(category_id, user_id = %caller.id, "Deleted category");
    Ok(StatusCode::NO_CONTENT)
}

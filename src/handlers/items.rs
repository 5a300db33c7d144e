use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use rusqlite::Connection;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::filters::ItemQuery;
use crate::handlers::{FormData, JsonBody};
use crate::items::{self, ItemInput};
use crate::models::{ClothingItem, ClothingItemWithCategory, FilterMetadata, Page};
use crate::state::AppState;
use crate::storage::ImageFormat;
use crate::validation::{blank_to_none, parse_bool, FieldErrors};

/// Item body parsed from either `application/json` or `multipart/form-data`.
pub struct ItemForm(pub ItemInput);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for ItemForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            let form = FormData::read(multipart).await?;
            Ok(ItemForm(input_from_form(&form)?))
        } else {
            let JsonBody(input) = JsonBody::<ItemInput>::from_request(req, state).await?;
            Ok(ItemForm(input))
        }
    }
}

/// Maps form fields onto [`ItemInput`]. Any `user_id` field is ignored.
fn input_from_form(form: &FormData) -> AppResult<ItemInput> {
    let mut errors = FieldErrors::new();
    let nullable = |key: &str| {
        form.has_field(key)
            .then(|| blank_to_none(form.field(key).map(str::to_string)))
    };

    let category_id = match form.field("category_id").map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("category_id", "The category_id must be an integer.");
                None
            }
        },
        None => None,
    };

    let favorite = match form.field("favorite").map(parse_bool) {
        Some(Ok(value)) => value,
        Some(Err(())) => {
            errors.add("favorite", "The favorite field must be true or false.");
            None
        }
        None => None,
    };

    errors.into_result()?;

    Ok(ItemInput {
        name: form.field("name").map(str::to_string),
        description: nullable("description"),
        category_id,
        color: nullable("color"),
        size: nullable("size"),
        brand: nullable("brand"),
        favorite,
        image: form.file("image").cloned(),
    })
}

/// Validates fields and image together so the caller sees every problem at once.
async fn validate_input(state: &AppState, input: &ItemInput, creating: bool) -> AppResult<Option<ImageFormat>> {
    let mut errors = match input.validate(&*state.db.lock().await, creating) {
        Ok(()) => FieldErrors::new(),
        Err(AppError::Validation(errors)) => errors,
        Err(err) => return Err(err),
    };

    let format = match &input.image {
        Some(image) => match state.images.validate(image) {
            Ok(format) => Some(format),
            Err(message) => {
                errors.add("image", message);
                None
            }
        },
        None => None,
    };

    errors.into_result()?;
    Ok(format)
}

async fn store_image(state: &AppState, input: &ItemInput, format: Option<ImageFormat>) -> AppResult<Option<String>> {
    match (&input.image, format) {
        (Some(image), Some(format)) => Ok(Some(state.images.store(image, format).await?)),
        _ => Ok(None),
    }
}

pub async fn list_items(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Page<ClothingItemWithCategory>>> {
    let query = ItemQuery::from_pairs(&params).map_err(AppError::Validation)?;
    let page = items::list(&*state.db.lock().await, &caller.id, &query)?;
    Ok(Json(page))
}

pub async fn filter_metadata(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<FilterMetadata>> {
    let metadata = items::filter_metadata(&*state.db.lock().await, &caller.id)?;
    Ok(Json(metadata))
}

pub async fn create_item(
    State(state): State<AppState>,
    caller: AuthUser,
    ItemForm(input): ItemForm,
) -> AppResult<impl IntoResponse> {
    let format = validate_input(&state, &input, true).await?;
    let image_path = store_image(&state, &input, format).await?;

    let created = {
        let conn = state.db.lock().await;
        items::create(&conn, &caller.id, &input, image_path.as_deref())
            .and_then(|item| items::with_category(&conn, item))
    };

    match created {
        Ok(item) => {
            tracing::info!(item_id = item.item.id, user_id = %caller.id, "Created clothing item");
            Ok((StatusCode::CREATED, Json(item)))
        }
        Err(err) => {
            if let Some(path) = &image_path {
                tracing::warn!(path = %path, "Removing image for item that failed to save");
                state.images.discard(path).await;
            }
            Err(err)
        }
    }
}

pub async fn show_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(item_id): Path<i64>,
) -> AppResult<Json<ClothingItemWithCategory>> {
    let conn = state.db.lock().await;
    let item = items::find_owned(&conn, item_id, &caller.id)?;
    Ok(Json(items::with_category(&conn, item)?))
}

fn apply_update(
    conn: &mut Connection,
    item: ClothingItem,
    input: &ItemInput,
    new_image: Option<&str>,
) -> AppResult<(ClothingItemWithCategory, Option<String>)> {
    let id = item.id;
    let tx = conn.transaction()?;
    items::update(&tx, item, input)?;
    let replaced = match new_image {
        Some(path) => items::swap_image_path(&tx, id, Some(path))?,
        None => None,
    };
    tx.commit()?;

    let fresh = items::find(conn, id)?.ok_or(AppError::NotFound("Clothing item"))?;
    Ok((items::with_category(conn, fresh)?, replaced))
}

/// New image first, then the record, then the old file, so a failure never
/// leaves `image_path` pointing at a missing file.
pub async fn update_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(item_id): Path<i64>,
    ItemForm(input): ItemForm,
) -> AppResult<Json<ClothingItemWithCategory>> {
    let item = items::find_owned(&*state.db.lock().await, item_id, &caller.id)?;
    let format = validate_input(&state, &input, false).await?;
    let new_image = store_image(&state, &input, format).await?;

    let result = apply_update(&mut *state.db.lock().await, item, &input, new_image.as_deref());

    match result {
        Ok((updated, replaced)) => {
            if let Some(old) = replaced {
                state.images.discard(&old).await;
            }
            tracing::info!(item_id, user_id = %caller.id, "Updated clothing item");
            Ok(Json(updated))
        }
        Err(err) => {
            if let Some(path) = &new_image {
                state.images.discard(path).await;
            }
            Err(err)
        }
    }
}

pub async fn delete_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(item_id): Path<i64>,
) -> AppResult<StatusCode> {
    let item = {
        let conn = state.db.lock().await;
        let item = items::find_owned(&conn, item_id, &caller.id)?;
        items::delete(&conn, item.id)?;
        item
    };

    if let Some(path) = &item.image_path {
        state.images.discard(path).await;
    }

    tracing::info!(item_id, user_id = %caller.id, "Deleted clothing item");
    Ok(StatusCode::NO_CONTENT)
}

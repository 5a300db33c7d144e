use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::FormData;
use crate::items;
use crate::state::AppState;
use crate::storage::UploadedImage;
use crate::validation::FieldErrors;

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploaded {
    pub message: String,
    pub image_path: String,
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkResult {
    pub clothing_item_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BulkResult {
    fn failed(clothing_item_id: &str, message: impl Into<String>) -> Self {
        BulkResult {
            clothing_item_id: clothing_item_id.to_string(),
            success: false,
            message: Some(message.into()),
            image_path: None,
            image_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUploaded {
    pub message: String,
    pub results: Vec<BulkResult>,
}

fn swap_in_transaction(conn: &mut Connection, item_id: i64, path: Option<&str>) -> rusqlite::Result<Option<String>> {
    let tx = conn.transaction()?;
    let previous = items::swap_image_path(&tx, item_id, path)?;
    tx.commit()?;
    Ok(previous)
}

/// Writes the new file, points the item at it, then removes the file it replaced.
async fn attach(state: &AppState, item_id: i64, image: &UploadedImage) -> AppResult<String> {
    let format = state
        .images
        .validate(image)
        .map_err(|message| AppError::validation("image", message))?;
    let path = state.images.store(image, format).await?;

    let swapped = swap_in_transaction(&mut *state.db.lock().await, item_id, Some(&path));
    match swapped {
        Ok(previous) => {
            if let Some(old) = previous {
                state.images.discard(&old).await;
            }
            Ok(path)
        }
        Err(err) => {
            tracing::warn!(item_id, path = %path, "Removing image after failed record update");
            state.images.discard(&path).await;
            Err(err.into())
        }
    }
}

async fn upload_image(state: AppState, caller: AuthUser, path_item: Option<i64>, form: FormData) -> AppResult<Json<ImageUploaded>> {
    let mut errors = FieldErrors::new();
    let image = form.file("image");
    match image.map(|image| state.images.validate(image)) {
        None => errors.add("image", "The image field is required."),
        Some(Err(message)) => errors.add("image", message),
        Some(Ok(_)) => {}
    }

    let item_id = match path_item {
        Some(id) => Some(id),
        None => match form.field("clothing_item_id").map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("clothing_item_id", "The selected clothing_item_id is invalid.");
                    None
                }
            },
            None => {
                errors.add("clothing_item_id", "The clothing_item_id field is required.");
                None
            }
        },
    };
    errors.into_result()?;

    let (Some(image), Some(item_id)) = (image, item_id) else {
        return Err(AppError::BadRequest("No image found in request".into()));
    };

    items::find_owned(&*state.db.lock().await, item_id, &caller.id)?;
    let image_path = attach(&state, item_id, image).await?;

    tracing::info!(item_id, user_id = %caller.id, path = %image_path, "Uploaded item image");
    Ok(Json(ImageUploaded {
        message: "Image uploaded successfully".into(),
        image_url: state.images.url(&image_path),
        image_path,
    }))
}

pub async fn upload(State(state): State<AppState>, caller: AuthUser, multipart: Multipart) -> AppResult<Json<ImageUploaded>> {
    let form = FormData::read(multipart).await?;
    upload_image(state, caller, None, form).await
}

pub async fn upload_for_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(item_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<ImageUploaded>> {
    let form = FormData::read(multipart).await?;
    upload_image(state, caller, Some(item_id), form).await
}

pub async fn delete_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(item_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let previous = {
        let mut conn = state.db.lock().await;
        let item = items::find_owned(&conn, item_id, &caller.id)?;
        if item.image_path.is_none() {
            tracing::warn!(item_id, "No image to delete");
            return Err(AppError::BadRequest("No image to delete".into()));
        }
        swap_in_transaction(&mut conn, item_id, None)?
    };

    if let Some(path) = previous {
        state.images.discard(&path).await;
    }

    tracing::info!(item_id, user_id = %caller.id, "Deleted item image");
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}

/// Pairs `images[i]` with `clothing_item_ids[i]`; one failure never stops the rest.
pub async fn bulk_upload(
    State(state): State<AppState>,
    caller: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<BulkUploaded>> {
    let form = FormData::read(multipart).await?;
    let images = form.files("images");
    let ids = form.values("clothing_item_ids");

    let mut errors = FieldErrors::new();
    if images.is_empty() {
        errors.add("images", "The images field is required.");
    }
    if ids.is_empty() {
        errors.add("clothing_item_ids", "The clothing item ids field is required.");
    }
    errors.into_result()?;

    if images.len() != ids.len() {
        return Err(AppError::BadRequest(
            "Number of images and clothing item IDs must match".into(),
        ));
    }

    let mut results = Vec::with_capacity(images.len());
    for (image, raw_id) in images.into_iter().zip(ids) {
        let result = bulk_one(&state, &caller.id, raw_id.trim(), image).await;
        results.push(result);
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    tracing::info!(user_id = %caller.id, total = results.len(), succeeded, "Bulk image upload finished");

    Ok(Json(BulkUploaded {
        message: "Bulk upload completed".into(),
        results,
    }))
}

async fn bulk_one(state: &AppState, caller: &Uuid, raw_id: &str, image: &UploadedImage) -> BulkResult {
    let Ok(item_id) = raw_id.parse::<i64>() else {
        return BulkResult::failed(raw_id, "Item not found or unauthorized");
    };

    let owned = items::find_owned(&*state.db.lock().await, item_id, caller);
    match owned {
        Ok(_) => {}
        Err(AppError::NotFound(_)) | Err(AppError::Forbidden) => {
            return BulkResult::failed(raw_id, "Item not found or unauthorized");
        }
        Err(err) => return BulkResult::failed(raw_id, err.to_string()),
    }

    match attach(state, item_id, image).await {
        Ok(path) => BulkResult {
            clothing_item_id: raw_id.to_string(),
            success: true,
            message: None,
            image_url: Some(state.images.url(&path)),
            image_path: Some(path),
        },
        Err(AppError::Validation(errors)) => {
            let message = errors
                .get("image")
                .and_then(|messages| messages.first().cloned())
                .unwrap_or_else(|| "Invalid image".into());
            BulkResult::failed(raw_id, message)
        }
        Err(err) => {
            tracing::error!(item_id, error = %err, "Bulk image upload failed for item");
            BulkResult::failed(raw_id, "Upload failed")
        }
    }
}

/// Streams a stored file; paths that escape the storage root are treated as missing.
pub async fn serve_image(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(full) = state.images.resolve(&path) else {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    match fs::File::open(&full).await {
        Ok(file) => {
            let stream = ReaderStream::new(file);
            let body = Body::from_stream(stream);
            let mime_type = mime_guess::from_path(&full).first_or_octet_stream();

            (
                [
                    (header::CONTENT_TYPE, mime_type.to_string()),
                    (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
                ],
                body,
            )
                .into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

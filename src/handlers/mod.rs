pub mod auth;
pub mod categories;
pub mod images;
pub mod items;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::storage::UploadedImage;

/// `Json<T>` whose rejections render through [`AppError`].
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// A multipart body read fully into memory.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, UploadedImage)>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(file_name) => {
                    let data = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.push((
                        name,
                        UploadedImage {
                            file_name: Some(file_name),
                            data,
                        },
                    ));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.push((name, value));
                }
            }
        }

        Ok(form)
    }

    /// Last value sent for `key` (or `key[]`).
    pub fn field(&self, key: &str) -> Option<&str> {
        self.values(key).last().copied()
    }

    pub fn values(&self, key: &str) -> Vec<&str> {
        let bracketed = format!("{key}[]");
        self.fields
            .iter()
            .filter(|(k, _)| k == key || *k == bracketed)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has_field(&self, key: &str) -> bool {
        !self.values(key).is_empty()
    }

    pub fn file(&self, key: &str) -> Option<&UploadedImage> {
        self.files(key).into_iter().last()
    }

    pub fn files(&self, key: &str) -> Vec<&UploadedImage> {
        let bracketed = format!("{key}[]");
        self.files
            .iter()
            .filter(|(k, _)| k == key || *k == bracketed)
            .map(|(_, file)| file)
            .collect()
    }
}

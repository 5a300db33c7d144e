use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};

use crate::client::api::{ApiClient, ClientError};
use crate::handlers::images::ImageUploaded;
use crate::items::ItemInput;
use crate::models::{ClothingItemWithCategory, FilterMetadata, Page};
use crate::storage::UploadedImage;

pub const PER_PAGE: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: i64,
    pub current_page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            total: 0,
            current_page: 1,
            per_page: PER_PAGE,
            last_page: 1,
        }
    }
}

/// Active list filters. Empty fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilters {
    pub search: Option<String>,
    pub category_ids: Vec<i64>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub brands: Vec<String>,
    pub favorite: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ItemFilters {
    pub fn to_query(&self, page: u32, per_page: u32) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), per_page.to_string()),
        ];

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            query.push(("search".into(), search.into()));
        }
        for id in &self.category_ids {
            query.push(("category_id[]".into(), id.to_string()));
        }
        push_text(&mut query, "color", &self.colors);
        push_text(&mut query, "size", &self.sizes);
        push_text(&mut query, "brand", &self.brands);
        if let Some(favorite) = self.favorite {
            query.push(("favorite".into(), if favorite { "1" } else { "0" }.into()));
        }
        if let Some(date) = self.date_from {
            query.push(("date_from".into(), date.to_string()));
        }
        if let Some(date) = self.date_to {
            query.push(("date_to".into(), date.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by".into(), sort_by.clone()));
        }
        if let Some(sort_order) = &self.sort_order {
            query.push(("sort_order".into(), sort_order.clone()));
        }

        query
    }
}

/// One value goes out as a scalar (substring match), several as `key[]` (exact match).
fn push_text(query: &mut Vec<(String, String)>, key: &str, values: &[String]) {
    match values {
        [] => {}
        [single] => query.push((key.to_string(), single.clone())),
        many => query.extend(many.iter().map(|v| (format!("{key}[]"), v.clone()))),
    }
}

fn image_part(image: &UploadedImage) -> Result<Part, ClientError> {
    let file_name = image.file_name.clone().unwrap_or_else(|| "image".into());
    let mime = mime_guess::from_path(&file_name).first_or_octet_stream();
    Ok(Part::bytes(image.data.to_vec())
        .file_name(file_name)
        .mime_str(mime.as_ref())?)
}

/// Multipart body for an item. Cleared nullable fields are sent empty.
pub fn item_form(input: &ItemInput) -> Result<Form, ClientError> {
    let mut form = Form::new();

    if let Some(name) = &input.name {
        form = form.text("name", name.clone());
    }
    if let Some(category_id) = input.category_id {
        form = form.text("category_id", category_id.to_string());
    }
    for (key, value) in [
        ("description", &input.description),
        ("color", &input.color),
        ("size", &input.size),
        ("brand", &input.brand),
    ] {
        if let Some(value) = value {
            form = form.text(key, value.clone().unwrap_or_default());
        }
    }
    if let Some(favorite) = input.favorite {
        form = form.text("favorite", if favorite { "1" } else { "0" });
    }
    if let Some(image) = &input.image {
        form = form.part("image", image_part(image)?);
    }

    Ok(form)
}

pub struct ItemStore {
    api: ApiClient,
    pub items: Vec<ClothingItemWithCategory>,
    pub current_item: Option<ClothingItemWithCategory>,
    pub pagination: Pagination,
    pub filters: ItemFilters,
    pub filter_options: FilterMetadata,
    pub loading: bool,
    pub error: Option<String>,
}

impl ItemStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            items: Vec::new(),
            current_item: None,
            pagination: Pagination::default(),
            filters: ItemFilters::default(),
            filter_options: FilterMetadata::default(),
            loading: false,
            error: None,
        }
    }

    /// Replaces the active filters when `filters` is given, then loads `page`.
    pub async fn fetch_items(&mut self, page: u32, filters: Option<ItemFilters>) -> Result<(), ClientError> {
        if let Some(filters) = filters {
            self.filters = filters;
        }
        let query = self.filters.to_query(page, self.pagination.per_page);

        self.begin();
        let result = self.api.get::<Page<ClothingItemWithCategory>>("/clothing-items", &query).await;
        let page = self.settle(result, "Failed to fetch clothing items")?;

        self.pagination = Pagination {
            total: page.total,
            current_page: page.current_page,
            per_page: page.per_page,
            last_page: page.last_page,
        };
        self.items = page.data;
        Ok(())
    }

    pub async fn fetch_item(&mut self, id: i64) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.get::<ClothingItemWithCategory>(&format!("/clothing-items/{id}"), &[]).await;
        let item = self.settle(result, "Failed to fetch clothing item")?;
        self.current_item = Some(item);
        Ok(())
    }

    pub async fn create_item(&mut self, input: &ItemInput) -> Result<ClothingItemWithCategory, ClientError> {
        self.begin();
        let result = match &input.image {
            Some(_) => match item_form(input) {
                Ok(form) => self.api.post_form::<ClothingItemWithCategory>("/clothing-items", form).await,
                Err(err) => Err(err),
            },
            None => self.api.post::<_, ClothingItemWithCategory>("/clothing-items", input).await,
        };
        let item: ClothingItemWithCategory = self.settle(result, "Failed to create clothing item")?;

        self.items.insert(0, item.clone());
        self.pagination.total += 1;
        Ok(item)
    }

    pub async fn update_item(&mut self, id: i64, input: &ItemInput) -> Result<ClothingItemWithCategory, ClientError> {
        let path = format!("/clothing-items/{id}");
        self.begin();
        let result = match &input.image {
            Some(_) => match item_form(input) {
                Ok(form) => self.api.put_form::<ClothingItemWithCategory>(&path, form).await,
                Err(err) => Err(err),
            },
            None => self.api.put::<_, ClothingItemWithCategory>(&path, input).await,
        };
        let item: ClothingItemWithCategory = self.settle(result, "Failed to update clothing item")?;

        self.replace_cached(&item);
        Ok(item)
    }

    pub async fn delete_item(&mut self, id: i64) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.delete(&format!("/clothing-items/{id}")).await;
        self.settle(result, "Failed to delete clothing item")?;

        let before = self.items.len();
        self.items.retain(|entry| entry.item.id != id);
        if self.items.len() < before {
            self.pagination.total = (self.pagination.total - 1).max(0);
        }
        if self.current_item.as_ref().is_some_and(|entry| entry.item.id == id) {
            self.current_item = None;
        }
        Ok(())
    }

    pub async fn toggle_favorite(&mut self, id: i64) -> Result<ClothingItemWithCategory, ClientError> {
        let cached = self
            .items
            .iter()
            .chain(self.current_item.iter())
            .find(|entry| entry.item.id == id)
            .map(|entry| entry.item.favorite);
        let favorite = match cached {
            Some(favorite) => favorite,
            None => {
                self.fetch_item(id).await?;
                self.current_item.as_ref().is_some_and(|entry| entry.item.favorite)
            }
        };

        let input = ItemInput {
            favorite: Some(!favorite),
            ..Default::default()
        };
        self.update_item(id, &input).await
    }

    pub async fn fetch_filter_options(&mut self) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.get::<FilterMetadata>("/clothing-items/filter-metadata", &[]).await;
        self.filter_options = self.settle(result, "Failed to fetch filter options")?;
        Ok(())
    }

    pub async fn upload_image(&mut self, id: i64, image: &UploadedImage) -> Result<ImageUploaded, ClientError> {
        self.begin();
        let result = match image_part(image) {
            Ok(part) => {
                let form = Form::new().part("image", part);
                self.api.post_form::<ImageUploaded>(&format!("/images/upload/{id}"), form).await
            }
            Err(err) => Err(err),
        };
        let uploaded = self.settle(result, "Failed to upload image")?;

        self.set_cached_image(id, Some(uploaded.image_path.clone()));
        Ok(uploaded)
    }

    pub async fn remove_image(&mut self, id: i64) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.delete(&format!("/images/{id}")).await;
        self.settle(result, "Failed to remove image")?;

        self.set_cached_image(id, None);
        Ok(())
    }

    fn cached_mut(&mut self, id: i64) -> impl Iterator<Item = &mut ClothingItemWithCategory> {
        self.items
            .iter_mut()
            .chain(self.current_item.iter_mut())
            .filter(move |entry| entry.item.id == id)
    }

    fn replace_cached(&mut self, item: &ClothingItemWithCategory) {
        for entry in self.cached_mut(item.item.id) {
            *entry = item.clone();
        }
    }

    fn set_cached_image(&mut self, id: i64, image_path: Option<String>) {
        for entry in self.cached_mut(id) {
            entry.item.image_path = image_path.clone();
        }
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn settle<T>(&mut self, result: Result<T, ClientError>, fallback: &str) -> Result<T, ClientError> {
        self.loading = false;
        result.inspect_err(|err| self.error = Some(err.message_or(fallback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(query: &[(String, String)]) -> Vec<(&str, &str)> {
        query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn query_sends_single_values_as_scalars_and_many_as_arrays() {
        let filters = ItemFilters {
            category_ids: vec![3],
            colors: vec!["red".into()],
            sizes: vec!["S".into(), "M".into()],
            favorite: Some(true),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..Default::default()
        };

        let query = filters.to_query(2, PER_PAGE);
        assert_eq!(
            pairs(&query),
            [
                ("page", "2"),
                ("per_page", "12"),
                ("category_id[]", "3"),
                ("color", "red"),
                ("size[]", "S"),
                ("size[]", "M"),
                ("favorite", "1"),
                ("date_from", "2024-01-31"),
            ]
        );
    }

    #[test]
    fn empty_search_is_left_out() {
        let filters = ItemFilters {
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filters.to_query(1, 12).len(), 2);
    }
}

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories;
use crate::db::timestamp;
use crate::error::{AppError, AppResult};
use crate::filters::ItemQuery;
use crate::models::{Category, CategoryCount, ClothingItem, ClothingItemWithCategory, FilterMetadata, Page};
use crate::storage::UploadedImage;
use crate::validation::{nullable, FieldErrors};

/// Fields accepted when creating or updating an item, from JSON or a form.
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub size: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub brand: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
}

impl ItemInput {
    /// Checks everything except the image, which the store validates.
    pub fn validate(&self, conn: &Connection, creating: bool) -> AppResult<()> {
        let mut errors = FieldErrors::new();

        if creating || self.name.is_some() {
            errors.required("name", self.name.as_deref(), 255);
        }

        match self.category_id {
            Some(id) => {
                if !categories::exists(conn, id)? {
                    errors.add("category_id", "The selected category_id is invalid.");
                }
            }
            None if creating => errors.add("category_id", "The category_id field is required."),
            None => {}
        }

        errors.max_len("color", self.color.clone().flatten().as_deref(), 50);
        errors.max_len("size", self.size.clone().flatten().as_deref(), 20);
        errors.max_len("brand", self.brand.clone().flatten().as_deref(), 100);

        errors.into_result()
    }
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<ClothingItem>> {
    conn.query_row(
        &format!("SELECT {} FROM clothing_items WHERE id = ?", ClothingItem::COLUMNS),
        [id],
        ClothingItem::from_row,
    )
    .optional()
}

/// Loads an item, failing with 404 when missing and 403 when owned by someone else.
pub fn find_owned(conn: &Connection, id: i64, user_id: &Uuid) -> AppResult<ClothingItem> {
    let item = find(conn, id)?.ok_or(AppError::NotFound("Clothing item"))?;
    if item.user_id != *user_id {
        tracing::warn!(item_id = id, caller = %user_id, "Ownership check failed");
        return Err(AppError::Forbidden);
    }
    Ok(item)
}

pub fn with_category(conn: &Connection, item: ClothingItem) -> AppResult<ClothingItemWithCategory> {
    let category = categories::find(conn, item.category_id)?.ok_or(AppError::NotFound("Category"))?;
    Ok(ClothingItemWithCategory { item, category })
}

pub fn list(
    conn: &Connection,
    user_id: &Uuid,
    query: &ItemQuery,
) -> rusqlite::Result<Page<ClothingItemWithCategory>> {
    let (filter, mut bound) = query.where_clause(user_id);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM clothing_items WHERE {filter}"),
        params_from_iter(bound.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {}, {} FROM clothing_items
         JOIN categories ON categories.id = clothing_items.category_id
         WHERE {filter} ORDER BY {} LIMIT ? OFFSET ?",
        ClothingItem::COLUMNS,
        category_columns(),
        query.order_clause()
    );
    bound.push(rusqlite::types::Value::Integer(query.per_page as i64));
    bound.push(rusqlite::types::Value::Integer(query.offset()));

    let mut stmt = conn.prepare(&sql)?;
    let data = stmt
        .query_map(params_from_iter(bound.iter()), |row| {
            Ok(ClothingItemWithCategory {
                item: ClothingItem::from_row(row)?,
                category: Category::from_row_at(row, ClothingItem::WIDTH)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page::new(data, total, query.page, query.per_page))
}

fn category_columns() -> String {
    Category::COLUMNS
        .split(", ")
        .map(|column| format!("categories.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn filter_metadata(conn: &Connection, user_id: &Uuid) -> rusqlite::Result<FilterMetadata> {
    let distinct = |column: &str| -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM clothing_items
             WHERE user_id = ? AND {column} IS NOT NULL AND {column} != ''
             ORDER BY {column} ASC"
        ))?;
        let values = stmt.query_map([user_id.to_string()], |row| row.get(0))?;
        values.collect()
    };

    let mut stmt = conn.prepare(
        "SELECT category_id, COUNT(*) FROM clothing_items WHERE user_id = ?
         GROUP BY category_id ORDER BY category_id",
    )?;
    let category_counts = stmt
        .query_map([user_id.to_string()], |row| {
            Ok(CategoryCount {
                category_id: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(FilterMetadata {
        colors: distinct("color")?,
        sizes: distinct("size")?,
        brands: distinct("brand")?,
        category_counts,
    })
}

/// Inserts an item owned by `user_id`. The input must already be validated.
pub fn create(
    conn: &Connection,
    user_id: &Uuid,
    input: &ItemInput,
    image_path: Option<&str>,
) -> AppResult<ClothingItem> {
    let now = timestamp(Utc::now());

    conn.execute(
        "INSERT INTO clothing_items
            (name, description, category_id, color, size, brand, image_path, favorite, user_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.name.as_deref().map(str::trim),
            input.description.clone().flatten(),
            input.category_id,
            input.color.clone().flatten(),
            input.size.clone().flatten(),
            input.brand.clone().flatten(),
            image_path,
            input.favorite.unwrap_or(false),
            user_id.to_string(),
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find(conn, id)?.ok_or(AppError::NotFound("Clothing item"))
}

/// Applies the provided fields. The input must already be validated.
pub fn update(conn: &Connection, mut item: ClothingItem, input: &ItemInput) -> AppResult<ClothingItem> {
    if let Some(name) = &input.name {
        item.name = name.trim().to_string();
    }
    if let Some(description) = &input.description {
        item.description = description.clone();
    }
    if let Some(category_id) = input.category_id {
        item.category_id = category_id;
    }
    if let Some(color) = &input.color {
        item.color = color.clone();
    }
    if let Some(size) = &input.size {
        item.size = size.clone();
    }
    if let Some(brand) = &input.brand {
        item.brand = brand.clone();
    }
    if let Some(favorite) = input.favorite {
        item.favorite = favorite;
    }
    item.updated_at = Utc::now();

    conn.execute(
        "UPDATE clothing_items
         SET name = ?, description = ?, category_id = ?, color = ?, size = ?, brand = ?, favorite = ?, updated_at = ?
         WHERE id = ?",
        params![
            item.name,
            item.description,
            item.category_id,
            item.color,
            item.size,
            item.brand,
            item.favorite,
            timestamp(item.updated_at),
            item.id
        ],
    )?;

    Ok(item)
}

/// Sets `image_path` and returns the value it replaced.
///
/// Run it inside a transaction so the read and the write land together; the
/// caller owns deleting the returned file.
pub fn swap_image_path(conn: &Connection, id: i64, path: Option<&str>) -> rusqlite::Result<Option<String>> {
    let previous: Option<String> =
        conn.query_row("SELECT image_path FROM clothing_items WHERE id = ?", [id], |row| row.get(0))?;
    conn.execute(
        "UPDATE clothing_items SET image_path = ?, updated_at = ? WHERE id = ?",
        params![path, timestamp(Utc::now()), id],
    )?;
    Ok(previous)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM clothing_items WHERE id = ?", [id])?;
    Ok(())
}

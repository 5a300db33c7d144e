use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, name, email, password_hash, created_at, updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: parse_uuid(0, row.get(0)?)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: parse_timestamp(4, row.get(4)?)?,
            updated_at: parse_timestamp(5, row.get(5)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub const COLUMNS: &'static str = "id, name, description, icon, color, created_at, updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    /// Reads a category whose columns start at `offset`, for joined selects.
    pub fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            description: row.get(offset + 2)?,
            icon: row.get(offset + 3)?,
            color: row.get(offset + 4)?,
            created_at: parse_timestamp(offset + 5, row.get(offset + 5)?)?,
            updated_at: parse_timestamp(offset + 6, row.get(offset + 6)?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub clothing_items_count: i64,
}

/// A category together with the caller's own items in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub clothing_items: Vec<ClothingItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothingItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub color: Option<String>,
    pub size: Option<String>,
    pub brand: Option<String>,
    pub image_path: Option<String>,
    pub favorite: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClothingItem {
    pub const COLUMNS: &'static str = "clothing_items.id, clothing_items.name, clothing_items.description, \
         clothing_items.category_id, clothing_items.color, clothing_items.size, clothing_items.brand, \
         clothing_items.image_path, clothing_items.favorite, clothing_items.user_id, \
         clothing_items.created_at, clothing_items.updated_at";

    /// Number of columns in [`Self::COLUMNS`].
    pub const WIDTH: usize = 12;

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ClothingItem {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category_id: row.get(3)?,
            color: row.get(4)?,
            size: row.get(5)?,
            brand: row.get(6)?,
            image_path: row.get(7)?,
            favorite: row.get(8)?,
            user_id: parse_uuid(9, row.get(9)?)?,
            created_at: parse_timestamp(10, row.get(10)?)?,
            updated_at: parse_timestamp(11, row.get(11)?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClothingItemWithCategory {
    #[serde(flatten)]
    pub item: ClothingItem,
    pub category: Category,
}

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub current_page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, current_page: u32, per_page: u32) -> Self {
        let pages = (total.max(0) as u64).div_ceil(per_page.max(1) as u64);
        Page {
            data,
            total,
            current_page,
            per_page,
            last_page: pages.max(1) as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub category_id: i64,
    pub count: i64,
}

/// Facet values available to one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterMetadata {
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub brands: Vec<String>,
    pub category_counts: Vec<CategoryCount>,
}

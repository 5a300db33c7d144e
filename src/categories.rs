use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::timestamp;
use crate::error::{AppError, AppResult};
use crate::filters::like_pattern;
use crate::models::{Category, CategoryDetail, CategoryWithCount, ClothingItem};
use crate::validation::{nullable, FieldErrors};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
}

impl CategoryInput {
    /// `existing` is the id being updated; `None` when creating.
    fn validate(&self, conn: &Connection, existing: Option<i64>) -> AppResult<()> {
        let mut errors = FieldErrors::new();

        if existing.is_none() || self.name.is_some() {
            errors.required("name", self.name.as_deref(), 50);
        }
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if name_taken(conn, name, existing)? {
                errors.add("name", "The name has already been taken.");
            }
        }

        errors.max_len("description", self.description.clone().flatten().as_deref(), 255);
        errors.max_len("icon", self.icon.clone().flatten().as_deref(), 30);
        errors.max_len("color", self.color.clone().flatten().as_deref(), 20);

        errors.into_result()
    }
}

fn name_taken(conn: &Connection, name: &str, except: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name = ? AND id IS NOT ?)",
        params![name, except],
        |row| row.get(0),
    )
}

pub fn list(conn: &Connection, search: Option<&str>) -> rusqlite::Result<Vec<CategoryWithCount>> {
    let mut sql = format!(
        "SELECT {}, (SELECT COUNT(*) FROM clothing_items WHERE clothing_items.category_id = categories.id)
         FROM categories",
        Category::COLUMNS
    );
    let mut bound = Vec::new();

    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        sql.push_str(" WHERE (name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\')");
        bound.push(like_pattern(search));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bound.iter()), |row| {
        Ok(CategoryWithCount {
            category: Category::from_row(row)?,
            clothing_items_count: row.get(7)?,
        })
    })?;
    rows.collect()
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE id = ?", Category::COLUMNS),
        [id],
        Category::from_row,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)",
        [id],
        |row| row.get(0),
    )
}

pub fn create(conn: &Connection, input: &CategoryInput) -> AppResult<Category> {
    input.validate(conn, None)?;

    let now = timestamp(Utc::now());
    conn.execute(
        "INSERT INTO categories (name, description, icon, color, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            input.name.as_deref().map(str::trim),
            input.description.clone().flatten(),
            input.icon.clone().flatten(),
            input.color.clone().flatten(),
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find(conn, id)?.ok_or(AppError::NotFound("Category"))
}

/// The category with only `user_id`'s items attached.
pub fn show(conn: &Connection, id: i64, user_id: &Uuid) -> AppResult<CategoryDetail> {
    let category = find(conn, id)?.ok_or(AppError::NotFound("Category"))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM clothing_items WHERE category_id = ? AND user_id = ?
         ORDER BY created_at DESC, id DESC",
        ClothingItem::COLUMNS
    ))?;
    let clothing_items = stmt
        .query_map(params![id, user_id.to_string()], ClothingItem::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(CategoryDetail {
        category,
        clothing_items,
    })
}

pub fn update(conn: &Connection, id: i64, input: &CategoryInput) -> AppResult<Category> {
    let mut category = find(conn, id)?.ok_or(AppError::NotFound("Category"))?;
    input.validate(conn, Some(id))?;

    if let Some(name) = &input.name {
        category.name = name.trim().to_string();
    }
    if let Some(description) = &input.description {
        category.description = description.clone();
    }
    if let Some(icon) = &input.icon {
        category.icon = icon.clone();
    }
    if let Some(color) = &input.color {
        category.color = color.clone();
    }
    category.updated_at = Utc::now();

    conn.execute(
        "UPDATE categories SET name = ?, description = ?, icon = ?, color = ?, updated_at = ? WHERE id = ?",
        params![
            category.name,
            category.description,
            category.icon,
            category.color,
            timestamp(category.updated_at),
            id
        ],
    )?;

    Ok(category)
}

/// Refuses while any item, from any user, still references the category.
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    if find(conn, id)?.is_none() {
        return Err(AppError::NotFound("Category"));
    }

    let item_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM clothing_items WHERE category_id = ?",
        [id],
        |row| row.get(0),
    )?;
    if item_count > 0 {
        return Err(AppError::Conflict {
            message: "Cannot delete category that has clothing items. Please reassign or delete the items first."
                .into(),
            item_count,
        });
    }

    conn.execute("DELETE FROM categories WHERE id = ?", [id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn named(name: &str) -> CategoryInput {
        CategoryInput {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn add_item(conn: &Connection, category_id: i64, user: &Uuid) {
        conn.execute(
            "INSERT OR IGNORE INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, 'u', ?1, 'x', 'now', 'now')",
            [user.to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO clothing_items (name, category_id, user_id, created_at, updated_at)
             VALUES ('Tee', ?, ?, '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')",
            params![category_id, user.to_string()],
        )
        .unwrap();
    }

    #[test]
    fn create_rejects_duplicates_and_long_fields() {
        let conn = memory();
        create(&conn, &named("Tops")).unwrap();

        let input = CategoryInput {
            name: Some("Tops".into()),
            icon: Some(Some("i".repeat(31))),
            ..Default::default()
        };
        match create(&conn, &input) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("name").unwrap(), ["The name has already been taken."]);
                assert!(errors.has("icon"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert!(matches!(create(&conn, &named("")), Err(AppError::Validation(_))));
        assert!(matches!(create(&conn, &named(&"n".repeat(51))), Err(AppError::Validation(_))));
    }

    #[test]
    fn update_may_keep_its_own_name() {
        let conn = memory();
        let tops = create(&conn, &named("Tops")).unwrap();
        create(&conn, &named("Bottoms")).unwrap();

        let same = CategoryInput {
            name: Some("Tops".into()),
            description: Some(Some("Upper body".into())),
            ..Default::default()
        };
        let updated = update(&conn, tops.id, &same).unwrap();
        assert_eq!(updated.description.as_deref(), Some("Upper body"));

        assert!(matches!(
            update(&conn, tops.id, &named("Bottoms")),
            Err(AppError::Validation(_))
        ));

        let cleared = CategoryInput {
            description: Some(None),
            ..Default::default()
        };
        assert_eq!(update(&conn, tops.id, &cleared).unwrap().description, None);
    }

    #[test]
    fn list_counts_items_and_searches_description() {
        let conn = memory();
        let tops = create(&conn, &named("Tops")).unwrap();
        let shoes = CategoryInput {
            name: Some("Footwear".into()),
            description: Some(Some("Boots and sandals".into())),
            ..Default::default()
        };
        create(&conn, &shoes).unwrap();
        add_item(&conn, tops.id, &Uuid::new_v4());

        let all = list(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].clothing_items_count, 1);
        assert_eq!(all[1].clothing_items_count, 0);

        let found = list(&conn, Some("BOOTS")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category.name, "Footwear");
    }

    #[test]
    fn delete_is_blocked_while_items_exist() {
        let conn = memory();
        let tops = create(&conn, &named("Tops")).unwrap();
        add_item(&conn, tops.id, &Uuid::new_v4());

        match delete(&conn, tops.id) {
            Err(AppError::Conflict { item_count, .. }) => assert_eq!(item_count, 1),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(find(&conn, tops.id).unwrap().is_some());

        let empty = create(&conn, &named("Formal")).unwrap();
        delete(&conn, empty.id).unwrap();
        assert!(find(&conn, empty.id).unwrap().is_none());
        assert!(matches!(delete(&conn, empty.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn show_filters_items_to_the_caller() {
        let conn = memory();
        let tops = create(&conn, &named("Tops")).unwrap();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        add_item(&conn, tops.id, &me);
        add_item(&conn, tops.id, &other);
        add_item(&conn, tops.id, &other);

        let detail = show(&conn, tops.id, &me).unwrap();
        assert_eq!(detail.clothing_items.len(), 1);
        assert_eq!(detail.clothing_items[0].user_id, me);
    }
}

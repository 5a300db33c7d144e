use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type DbConnection = Arc<Mutex<Connection>>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS auth_tokens (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        icon TEXT,
        color TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clothing_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        category_id INTEGER NOT NULL,
        color TEXT,
        size TEXT,
        brand TEXT,
        image_path TEXT,
        favorite INTEGER NOT NULL DEFAULT 0,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (category_id) REFERENCES categories (id) ON DELETE RESTRICT,
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_clothing_items_user ON clothing_items (user_id);
    CREATE INDEX IF NOT EXISTS idx_clothing_items_category ON clothing_items (category_id);
";

const DEFAULT_CATEGORIES: [(&str, &str); 10] = [
    ("Tops", "Shirts, t-shirts, blouses, and other upper body garments"),
    ("Bottoms", "Pants, shorts, skirts, and other lower body garments"),
    ("Dresses", "Full-body garments including dresses and jumpsuits"),
    ("Outerwear", "Jackets, coats, sweaters, and other outer layers"),
    ("Footwear", "Shoes, boots, sandals, and other foot coverings"),
    ("Accessories", "Hats, scarves, jewelry, bags, and other accessories"),
    ("Sportswear", "Athletic and workout clothing"),
    ("Sleepwear", "Pajamas, nightgowns, and other sleeping attire"),
    ("Underwear", "Undergarments and lingerie"),
    ("Formal", "Formal attire for special occasions"),
];

pub fn establish_connection(path: &str) -> Result<DbConnection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn open_in_memory() -> Result<DbConnection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA)
}

/// Inserts the stock categories when the table is empty. Returns how many were added.
pub fn seed_categories(conn: &Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let now = timestamp(Utc::now());
    let mut stmt = conn.prepare(
        "INSERT INTO categories (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )?;
    for (name, description) in DEFAULT_CATEGORIES {
        stmt.execute(params![name, description, now, now])?;
    }

    Ok(DEFAULT_CATEGORIES.len())
}

/// Fixed-width RFC 3339 so stored timestamps order correctly as text.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(idx: usize, raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub fn parse_uuid(idx: usize, raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

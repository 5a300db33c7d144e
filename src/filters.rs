//! Query-string parsing and SQL composition for the clothing item list.
//!
//! Every statement produced here starts with the owner predicate, so a list
//! query can never see another user's rows.

use chrono::NaiveDate;
use rusqlite::types::Value;
use uuid::Uuid;

use crate::validation::{parse_bool, FieldErrors};

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Name,
    Brand,
    Color,
    Size,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    /// Unknown names fall back to `created_at`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "name" => SortKey::Name,
            "brand" => SortKey::Brand,
            "color" => SortKey::Color,
            "size" => SortKey::Size,
            "updated_at" => SortKey::UpdatedAt,
            _ => SortKey::CreatedAt,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortKey::Name => "clothing_items.name",
            SortKey::Brand => "clothing_items.brand",
            SortKey::Color => "clothing_items.color",
            SortKey::Size => "clothing_items.size",
            SortKey::CreatedAt => "clothing_items.created_at",
            SortKey::UpdatedAt => "clothing_items.updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A single value matches by substring, several by exact membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFilter {
    Contains(String),
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub search: Option<String>,
    pub category_ids: Vec<i64>,
    pub color: Option<TextFilter>,
    pub size: Option<TextFilter>,
    pub brand: Option<TextFilter>,
    pub favorite: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub per_page: u32,
    pub page: u32,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            search: None,
            category_ids: Vec::new(),
            color: None,
            size: None,
            brand: None,
            favorite: None,
            date_from: None,
            date_to: None,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            per_page: DEFAULT_PER_PAGE,
            page: 1,
        }
    }
}

/// Collected values for one key; `bracketed` is set when any came as `key[]`.
#[derive(Default)]
struct Values<'a> {
    items: Vec<&'a str>,
    bracketed: bool,
}

impl ItemQuery {
    /// Builds a query from raw `(key, value)` pairs, accepting both `key` and
    /// `key[]` spellings and repeated keys.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, FieldErrors> {
        let values = |key: &str| collect(pairs, key);
        let last = |key: &str| values(key).items.last().map(|v| v.trim().to_string());

        let mut errors = FieldErrors::new();
        let mut query = ItemQuery {
            search: last("search").filter(|s| !s.is_empty()),
            ..Default::default()
        };

        for raw in values("category_id").items {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<i64>() {
                Ok(id) => query.category_ids.push(id),
                Err(_) => errors.add("category_id", "The category_id must be an integer."),
            }
        }

        query.color = text_filter(values("color"));
        query.size = text_filter(values("size"));
        query.brand = text_filter(values("brand"));

        if let Some(raw) = last("favorite") {
            match parse_bool(&raw) {
                Ok(value) => query.favorite = value,
                Err(()) => errors.add("favorite", "The favorite field must be true or false."),
            }
        }

        for (key, slot) in [("date_from", &mut query.date_from), ("date_to", &mut query.date_to)] {
            if let Some(raw) = last(key).filter(|s| !s.is_empty()) {
                match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                    Ok(date) => *slot = Some(date),
                    Err(_) => errors.add(key, format!("The {key} is not a valid date.")),
                }
            }
        }

        if let Some(raw) = last("sort_by") {
            query.sort_by = SortKey::parse(&raw);
        }
        if let Some(raw) = last("sort_order") {
            query.sort_order = SortOrder::parse(&raw);
        }

        query.per_page = last("per_page")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|n| n.clamp(1, MAX_PER_PAGE as i64) as u32)
            .unwrap_or(DEFAULT_PER_PAGE);
        query.page = last("page")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|n| n.clamp(1, u32::MAX as i64) as u32)
            .unwrap_or(1);

        if errors.is_empty() {
            Ok(query)
        } else {
            Err(errors)
        }
    }

    /// `WHERE` clause and its positional parameters, owner predicate first.
    pub fn where_clause(&self, user_id: &Uuid) -> (String, Vec<Value>) {
        let mut clauses = vec!["clothing_items.user_id = ?".to_string()];
        let mut params = vec![Value::Text(user_id.to_string())];

        if let Some(search) = &self.search {
            let pattern = Value::Text(like_pattern(search));
            clauses.push(
                "(clothing_items.name LIKE ? ESCAPE '\\' OR clothing_items.description LIKE ? ESCAPE '\\' \
                 OR clothing_items.brand LIKE ? ESCAPE '\\' OR clothing_items.color LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            params.extend(std::iter::repeat(pattern).take(4));
        }

        if !self.category_ids.is_empty() {
            clauses.push(format!(
                "clothing_items.category_id IN ({})",
                placeholders(self.category_ids.len())
            ));
            params.extend(self.category_ids.iter().map(|id| Value::Integer(*id)));
        }

        for (column, filter) in [
            ("clothing_items.color", &self.color),
            ("clothing_items.size", &self.size),
            ("clothing_items.brand", &self.brand),
        ] {
            match filter {
                Some(TextFilter::Contains(needle)) => {
                    clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                    params.push(Value::Text(like_pattern(needle)));
                }
                Some(TextFilter::AnyOf(set)) => {
                    clauses.push(format!("{column} IN ({})", placeholders(set.len())));
                    params.extend(set.iter().cloned().map(Value::Text));
                }
                None => {}
            }
        }

        if let Some(favorite) = self.favorite {
            clauses.push("clothing_items.favorite = ?".to_string());
            params.push(Value::Integer(favorite as i64));
        }

        // created_at is `YYYY-MM-DDTHH:MM:SS.sssZ`; its first ten characters are the date.
        if let Some(from) = self.date_from {
            clauses.push("substr(clothing_items.created_at, 1, 10) >= ?".to_string());
            params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            clauses.push("substr(clothing_items.created_at, 1, 10) <= ?".to_string());
            params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }

        (clauses.join(" AND "), params)
    }

    pub fn order_clause(&self) -> String {
        let dir = self.sort_order.sql();
        format!("{} {dir}, clothing_items.id {dir}", self.sort_by.column())
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

fn collect<'a>(pairs: &'a [(String, String)], key: &str) -> Values<'a> {
    let bracketed_key = format!("{key}[]");
    let mut out = Values::default();
    for (k, v) in pairs {
        if k == key {
            out.items.push(v.as_str());
        } else if *k == bracketed_key {
            out.items.push(v.as_str());
            out.bracketed = true;
        }
    }
    out
}

fn text_filter(values: Values<'_>) -> Option<TextFilter> {
    let items: Vec<String> = values
        .items
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    match items.len() {
        0 => None,
        1 if !values.bracketed => items.into_iter().next().map(TextFilter::Contains),
        _ => Some(TextFilter::AnyOf(items)),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Wraps a needle in `%` after escaping LIKE metacharacters.
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

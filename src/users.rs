use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::db::{timestamp, DbConnection};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::validation::FieldErrors;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUser {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginUser {
    fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        errors.required("email", self.email.as_deref(), 255);
        errors.required("password", self.password.as_deref(), 255);
        errors.into_result()
    }
}

impl RegisterUser {
    fn validate(&self, conn: &Connection) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        errors.required("name", self.name.as_deref(), 255);
        errors.required("email", self.email.as_deref(), 255);

        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if !email.contains('@') {
                errors.add("email", "The email must be a valid email address.");
            } else if find_by_email(conn, email)?.is_some() {
                errors.add("email", "The email has already been taken.");
            }
        }

        match self.password.as_deref() {
            None | Some("") => errors.add("password", "The password field is required."),
            Some(p) if p.chars().count() < MIN_PASSWORD_LEN => errors.add(
                "password",
                format!("The password must be at least {MIN_PASSWORD_LEN} characters."),
            ),
            Some(_) => {}
        }

        errors.into_result()
    }
}

/// Validates and inserts a new user. `cost` is the bcrypt work factor.
///
/// The hash is computed with the connection unlocked; the email is checked
/// again before the insert.
pub async fn register(db: &DbConnection, input: &RegisterUser, cost: u32) -> AppResult<User> {
    input.validate(&*db.lock().await)?;

    let password_hash = hash_password(input.password.clone().unwrap_or_default(), cost).await?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: input.name.as_deref().unwrap_or_default().trim().to_string(),
        email: input.email.as_deref().unwrap_or_default().trim().to_string(),
        password_hash,
        created_at: now,
        updated_at: now,
    };

    let conn = db.lock().await;
    if find_by_email(&conn, &user.email)?.is_some() {
        return Err(AppError::validation("email", "The email has already been taken."));
    }
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            timestamp(now),
            timestamp(now)
        ],
    )?;

    Ok(user)
}

/// Returns the user only when the password matches. Verification runs unlocked.
pub async fn authenticate(db: &DbConnection, input: &LoginUser) -> AppResult<User> {
    input.validate()?;

    let email = input.email.as_deref().unwrap_or_default().trim();
    let user = find_by_email(&*db.lock().await, email)?.ok_or(AppError::InvalidCredentials)?;

    let password = input.password.clone().unwrap_or_default();
    if verify_password(password, user.password_hash.clone()).await? {
        Ok(user)
    } else {
        Err(AppError::InvalidCredentials)
    }
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?", User::COLUMNS),
        [email],
        User::from_row,
    )
    .optional()
}

pub fn find(conn: &Connection, id: &Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", User::COLUMNS),
        [id.to_string()],
        User::from_row,
    )
    .optional()
}

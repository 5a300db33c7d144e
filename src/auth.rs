use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, timestamp};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const TOKEN_LENGTH: usize = 40;

/// Hashes on the blocking pool; bcrypt at the default cost takes about a second.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false)).await?;
    Ok(matched)
}

/// Random alphanumeric string, used for bearer tokens and stored file names.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn create_auth_token(conn: &Connection, user_id: &Uuid) -> rusqlite::Result<String> {
    let token = random_string(TOKEN_LENGTH);

    conn.execute(
        "INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?, ?, ?)",
        params![token, user_id.to_string(), timestamp(Utc::now())],
    )?;

    Ok(token)
}

pub fn verify_auth_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<Uuid>> {
    conn.query_row(
        "SELECT user_id FROM auth_tokens WHERE token = ?",
        [token],
        |row| parse_uuid(0, row.get(0)?),
    )
    .optional()
}

pub fn revoke_auth_token(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute("DELETE FROM auth_tokens WHERE token = ?", [token])?;
    Ok(removed > 0)
}

/// The caller identified by the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let user_id = verify_auth_token(&*state.db.lock().await, token)?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser {
            id: user_id,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn conn_with_user() -> (Connection, Uuid) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?, 'Ada', 'ada@example.com', 'x', 'now', 'now')",
            [id.to_string()],
        )
        .unwrap();
        (conn, id)
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hashed = hash_password("correct horse".into(), 4).await.unwrap();
        assert!(verify_password("correct horse".into(), hashed.clone()).await.unwrap());
        assert!(!verify_password("wrong horse".into(), hashed).await.unwrap());
        assert!(!verify_password("anything".into(), "not-a-hash".into()).await.unwrap());
    }

    #[test]
    fn tokens_resolve_until_revoked() {
        let (conn, user_id) = conn_with_user();
        let token = create_auth_token(&conn, &user_id).unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);

        assert_eq!(verify_auth_token(&conn, &token).unwrap(), Some(user_id));
        assert!(revoke_auth_token(&conn, &token).unwrap());
        assert_eq!(verify_auth_token(&conn, &token).unwrap(), None);
        assert!(!revoke_auth_token(&conn, &token).unwrap());
    }
}

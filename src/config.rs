use std::path::PathBuf;

use crate::validation::parse_bool;

/// Server configuration loaded from environment variables.
///
/// | Env Var           | Default                  |
/// |-------------------|--------------------------|
/// | `HOST`            | `0.0.0.0`                |
/// | `PORT`            | `8000`                   |
/// | `DATABASE_PATH`   | `wardrobe.db`            |
/// | `STORAGE_DIR`     | `storage`                |
/// | `PUBLIC_URL`      | `http://localhost:8000`  |
/// | `MAX_IMAGE_KB`    | `2048`                   |
/// | `MAX_BODY_BYTES`  | `20971520`               |
/// | `BCRYPT_COST`     | `12`                     |
/// | `SEED_CATEGORIES` | `true`                   |
/// | `CORS_ORIGINS`    | `http://localhost:5173`  |
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub storage_dir: PathBuf,
    /// Base used when building absolute image URLs.
    pub public_url: String,
    pub max_image_kb: usize,
    pub max_body_bytes: usize,
    pub bcrypt_cost: u32,
    pub seed_categories: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            database_path: "wardrobe.db".into(),
            storage_dir: PathBuf::from("storage"),
            public_url: "http://localhost:8000".into(),
            max_image_kb: 2048,
            max_body_bytes: 20 * 1024 * 1024,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            seed_categories: true,
            cors_origins: vec!["http://localhost:5173".into()],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.cors_origins,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port)?,
            database_path: std::env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            storage_dir: std::env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            public_url: std::env::var("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            max_image_kb: parsed("MAX_IMAGE_KB", defaults.max_image_kb)?,
            max_body_bytes: parsed("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            bcrypt_cost: parsed("BCRYPT_COST", defaults.bcrypt_cost)?,
            seed_categories: flag("SEED_CATEGORIES", std::env::var("SEED_CATEGORIES").ok(), defaults.seed_categories)?,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Booleans accept the same spellings as request filters (`1`, `yes`, `on`, ...).
fn flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_bool(&value) {
        Ok(parsed) => Ok(parsed.unwrap_or(default)),
        Err(()) => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cap_images_at_two_megabytes() {
        let config = Config::default();
        assert_eq!(config.max_image_kb, 2048);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert!(config.seed_categories);
    }

    #[test]
    fn unset_key_falls_back_to_default() {
        let value: u16 = parsed("WARDROBE_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn flags_accept_common_boolean_spellings() {
        assert!(flag("SEED_CATEGORIES", Some("yes".into()), false).unwrap());
        assert!(!flag("SEED_CATEGORIES", Some("0".into()), true).unwrap());
        assert!(flag("SEED_CATEGORIES", Some(" ".into()), true).unwrap());
        assert!(flag("SEED_CATEGORIES", None, true).unwrap());
        assert!(matches!(
            flag("SEED_CATEGORIES", Some("maybe".into()), true),
            Err(ConfigError::Invalid { key: "SEED_CATEGORIES", .. })
        ));
    }
}

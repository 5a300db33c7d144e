use std::sync::Arc;

use crate::config::Config;
use crate::db::DbConnection;
use crate::storage::ImageStore;

/// Shared state handed to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub images: ImageStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbConnection, config: Config) -> Self {
        let images = ImageStore::new(
            config.storage_dir.clone(),
            config.max_image_kb,
            config.public_url.clone(),
        );

        Self {
            db,
            images,
            config: Arc::new(config),
        }
    }
}

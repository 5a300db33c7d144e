pub mod auth;
pub mod categories;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod items;
pub mod models;
pub mod state;
pub mod storage;
pub mod users;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{auth as auth_handlers, categories as category_handlers, images, items as item_handlers};
use crate::state::AppState;

/// The full route table. API routes live under `/api`; stored images under `/storage`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(auth_handlers::register_user))
        .route("/login", post(auth_handlers::login_user))
        .route("/logout", post(auth_handlers::logout_user))
        .route("/user", get(auth_handlers::current_user))
        .route(
            "/categories",
            get(category_handlers::list_categories).post(category_handlers::create_category),
        )
        .route(
            "/categories/:category_id",
            get(category_handlers::show_category)
                .put(category_handlers::update_category)
                .delete(category_handlers::delete_category),
        )
        .route("/clothing-items/filter-metadata", get(item_handlers::filter_metadata))
        .route(
            "/clothing-items",
            get(item_handlers::list_items).post(item_handlers::create_item),
        )
        .route(
            "/clothing-items/:item_id",
            get(item_handlers::show_item)
                .put(item_handlers::update_item)
                .post(item_handlers::update_item)
                .delete(item_handlers::delete_item),
        )
        .route("/images/upload", post(images::upload))
        .route("/images/upload/:item_id", post(images::upload_for_item))
        .route("/images/bulk-upload", post(images::bulk_upload))
        .route("/images/:item_id", delete(images::delete_image));

    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .nest("/api", api)
        .route("/storage/*path", get(images::serve_image))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

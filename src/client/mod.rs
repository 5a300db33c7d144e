//! Typed client for the wardrobe API.
//!
//! An [`ApiClient`] carries the shared [`Session`]; the auth, category and item
//! containers each hold a clone of it and cache what they fetched.

pub mod api;
pub mod auth;
pub mod categories;
pub mod items;
pub mod routes;

pub use api::{ApiClient, ClientError, FileTokenStore, MemoryTokenStore, Session, TokenStore};
pub use auth::{AuthStatus, AuthStore};
pub use categories::CategoryStore;
pub use items::{ItemFilters, ItemStore, Pagination};
pub use routes::{resolve, Navigation, View};

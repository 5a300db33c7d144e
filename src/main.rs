use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wardrobe::{config::Config, db, state::AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wardrobe=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let conn = db::establish_connection(&config.database_path)
        .expect("Failed to establish database connection");
    if config.seed_categories {
        let seeded = db::seed_categories(&*conn.lock().await).expect("Failed to seed categories");
        if seeded > 0 {
            tracing::info!(seeded, "Seeded default categories");
        }
    }

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .expect("Failed to create storage directory");

    let addr = config.bind_addr();
    let app = wardrobe::app(AppState::new(conn, config));

    let listener = tokio::net::TcpListener::bind(&addr).await.expect("Failed to bind");
    tracing::info!("Server running on http://{addr}");
    axum::serve(listener, app).await.expect("Server error");
}

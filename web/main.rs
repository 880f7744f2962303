mod auth;
mod search;

use axum::{
    Router,
    routing::{get, post},
};
use pixsift::database::Database;
use search::AppState;
use sqlx::Pool;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./db/database.db".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    #[cfg(feature = "sqlite")]
    {
        use sqlx::migrate::MigrateDatabase;

        if !sqlx::Sqlite::database_exists(&database_url)
            .await
            .unwrap_or(false)
        {
            sqlx::Sqlite::create_database(&database_url).await.unwrap();
        }
    }

    let db = Database::with_migration(Pool::connect(&database_url).await.unwrap())
        .await
        .unwrap();

    let state = AppState {
        db: Arc::new(db),
        gate: Arc::new(auth::AllowAll),
    };

    let app = Router::new()
        .route("/search_filtering/", get(search::search_tags))
        .route(
            "/search_filtering/by_description",
            get(search::search_description),
        )
        .route(
            "/search_filtering/sorted-by-rating",
            post(search::sorted_by_rating),
        )
        .route(
            "/search_filtering/sorted-by-date",
            post(search::sorted_by_date),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, app).await.unwrap();
}

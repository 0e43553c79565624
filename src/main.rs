use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod state;

use quicksearch::config;
use quicksearch::db;
use quicksearch::search::IndexStore;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quicksearch=debug,quicksearch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config()?;
    tracing::info!("Server will listen on {}", app_config.get_bind_address());

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| app_config.get_database_url());
    let pool = SqlitePool::connect(&database_url).await?;
    db::run_migrations(&pool).await?;

    // 搜索数据库独立于主数据库
    let search_db_path = app_config.get_search_db_path();
    let index = IndexStore::open_standalone(&search_db_path).await?;
    tracing::info!("Search database: {:?}", search_db_path);

    let bind_address = app_config.get_bind_address();
    let state = Arc::new(AppState::new(app_config, pool, index).await?);
    match state.build.status().await {
        Ok(progress) => tracing::info!(
            "Index status: {} ({} of {} items)",
            progress.status,
            progress.indexed,
            progress.total
        ),
        Err(e) => tracing::warn!("Failed to read index status: {}", e),
    }

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Listening on {}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

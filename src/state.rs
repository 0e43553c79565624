use sqlx::SqlitePool;
use std::sync::Arc;

use quicksearch::build::BuildService;
use quicksearch::config::AppConfig;
use quicksearch::content::SqliteContentSource;
use quicksearch::error::BuildError;
use quicksearch::search::{IndexStore, SearchEngine, SuggestionEngine};

/// Application state / 应用状态
///
/// Built once in main and shared by every handler; the build service is the
/// only owner of the build state.
pub struct AppState {
    pub config: AppConfig,
    pub db: SqlitePool,
    pub build: BuildService,
    pub search: SearchEngine,
    pub suggest: SuggestionEngine,
}

impl AppState {
    pub async fn new(config: AppConfig, db: SqlitePool, index: IndexStore) -> Result<Self, BuildError> {
        let source = Arc::new(SqliteContentSource::new(db.clone()));
        let build = BuildService::open(index.clone(), source.clone(), &config).await?;
        let search = SearchEngine::new(index.clone(), source, config.search.clone());
        let suggest = SuggestionEngine::new(index, config.search.field_weights);

        Ok(Self {
            config,
            db,
            build,
            search,
            suggest,
        })
    }
}

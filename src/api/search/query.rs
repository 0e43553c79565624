use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use quicksearch::search::{SearchPage, SearchQuery};

use super::types::*;
use crate::api::ApiResponse;
use crate::state::AppState;

/// 搜索（无索引时自动回退）
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchQuery>,
) -> Json<ApiResponse<SearchPage>> {
    let page = state.search.search(&req).await;
    tracing::debug!(
        "Search {:?}: {} hits from {:?}, has_more={}",
        req.query,
        page.hits.len(),
        page.source,
        page.has_more
    );
    Json(ApiResponse::success(page))
}

/// 搜索联想
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Json<ApiResponse<SuggestResponse>> {
    let count = params.count.unwrap_or(state.config.search.suggestion_count);
    let suggestions = state.suggest.suggest(&params.q, count).await;
    let suggestion = suggestions.first().cloned().unwrap_or_default();
    Json(ApiResponse::success(SuggestResponse {
        suggestion,
        suggestions,
    }))
}

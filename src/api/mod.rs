pub mod search;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            code: status.as_u16() as i32,
            message: message.to_string(),
            data: None,
        }
    }
}

/// 健康检查 / Liveness and version
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("QUICKSEARCH_BUILD_TIME"),
        "database": database,
    }))
}

/// All API routes / 全部接口路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/admin/search/index", post(search::control_index))
        .route("/api/admin/search/status", get(search::get_index_status))
        .route("/api/admin/search/errors", get(search::get_index_errors))
        .route("/api/search", post(search::search))
        .route("/api/search/suggest", get(search::suggest))
        .with_state(state)
}

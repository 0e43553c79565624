use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use quicksearch::build::BuildProgress;
use quicksearch::error::BuildError;

use super::types::*;
use crate::api::ApiResponse;
use crate::auth::{extract_token, require_token};
use crate::state::AppState;

type AdminError = (StatusCode, Json<ApiResponse<BuildProgress>>);

fn unauthorized((status, message): (StatusCode, String)) -> AdminError {
    (status, Json(ApiResponse::error(status, &message)))
}

/// 构建错误转换为 HTTP 响应
async fn build_error(state: &AppState, error: BuildError) -> AdminError {
    let status = match &error {
        BuildError::Busy => StatusCode::CONFLICT,
        BuildError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Index control failed: {}", error);
    }

    let mut body = ApiResponse::error(status, &error.to_string());
    // 附带当前进度，便于客户端继续轮询
    if matches!(error, BuildError::Busy | BuildError::InvalidTransition { .. }) {
        body.data = state.build.status().await.ok();
    }
    (status, Json(body))
}

/// 索引控制：创建/暂停/删除/单条目
pub async fn control_index(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<ApiResponse<ControlResponse>>, AdminError> {
    require_token(&state.config.admin_token, Some(req.token.as_str())).map_err(unauthorized)?;

    let action = ControlAction::parse(&req.action).ok_or_else(|| -> AdminError {
        let message = format!("Unknown action: {}", req.action);
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(StatusCode::BAD_REQUEST, &message)),
        )
    })?;
    tracing::debug!("Index control action {:?}", action);

    let item_id = || -> Result<i64, AdminError> {
        req.item_id.ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(StatusCode::BAD_REQUEST, "item_id is required")),
            )
        })
    };

    let result = match action {
        ControlAction::Create => state.build.create().await.map(ControlResponse::Progress),
        ControlAction::Pause => state.build.pause().await.map(ControlResponse::Progress),
        ControlAction::Delete => state.build.delete().await.map(ControlResponse::Progress),
        ControlAction::IndexSingleItem => {
            let item_id = item_id()?;
            state
                .build
                .index_item(item_id)
                .await
                .map(|outcome| ControlResponse::Item(ItemResult { item_id, outcome }))
        }
        ControlAction::RemoveSingleItem => {
            let item_id = item_id()?;
            state
                .build
                .remove_item(item_id)
                .await
                .map(|outcome| ControlResponse::Item(ItemResult { item_id, outcome }))
        }
    };

    match result {
        Ok(response) => Ok(Json(ApiResponse::success(response))),
        Err(e) => Err(build_error(&state, e).await),
    }
}

/// 获取索引状态
pub async fn get_index_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<BuildProgress>>, AdminError> {
    require_token(&state.config.admin_token, extract_token(&headers)).map_err(unauthorized)?;

    match state.build.status().await {
        Ok(progress) => Ok(Json(ApiResponse::success(progress))),
        Err(e) => Err(build_error(&state, e).await),
    }
}

/// 获取错误记录
pub async fn get_index_errors(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<LedgerEntry>>>, AdminError> {
    require_token(&state.config.admin_token, extract_token(&headers)).map_err(unauthorized)?;

    match state.build.errors().await {
        Ok(ledger) => Ok(Json(ApiResponse::success(
            ledger
                .iter()
                .map(|(item_id, message)| LedgerEntry {
                    item_id,
                    message: message.to_string(),
                })
                .collect(),
        ))),
        Err(e) => Err(build_error(&state, e).await),
    }
}

//! Search and index control endpoints / 搜索与索引控制接口

mod admin;
mod query;
mod types;

pub use admin::{control_index, get_index_errors, get_index_status};
pub use query::{search, suggest};

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use quicksearch::config::{AppConfig, BatchSize};
    use quicksearch::search::IndexStore;

    use crate::api::router;
    use crate::auth::SEARCH_TOKEN_HEADER;
    use crate::state::AppState;

    const TOKEN: &str = "test-token";

    struct TestApp {
        _dir: TempDir,
        router: Router,
        state: Arc<AppState>,
    }

    async fn seed(pool: &SqlitePool, count: i64) {
        for id in 1..=count {
            let title = if id == 1 { "Wireless Mouse Pro".to_string() } else { format!("Catalog entry {}", id) };
            sqlx::query(
                "INSERT INTO content_items (id, item_type, title, body, status, published_at, updated_at) VALUES (?, 'post', ?, 'catalog body', 'publish', ?, ?)",
            )
            .bind(id)
            .bind(title)
            .bind(1_700_000_000 + id)
            .bind(1_700_000_000 + id)
            .execute(pool)
            .await
            .unwrap();
        }
    }

    async fn app(items: i64) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("content.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
        quicksearch::db::run_migrations(&pool).await.unwrap();
        seed(&pool, items).await;

        let index = IndexStore::open_standalone(&dir.path().join("search").join("search.db"))
            .await
            .unwrap();
        let mut config = AppConfig {
            admin_token: TOKEN.to_string(),
            ..AppConfig::default()
        };
        config.build.batch_size = BatchSize::try_from(10).unwrap();

        let state = Arc::new(AppState::new(config, pool, index).await.unwrap());
        TestApp {
            _dir: dir,
            router: router(state.clone()),
            state,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(SEARCH_TOKEN_HEADER, token)
            .body(Body::empty())
            .unwrap()
    }

    fn control(action: &str) -> Request<Body> {
        post("/api/admin/search/index", json!({"action": action, "token": TOKEN}))
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(0).await;
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_control_rejects_bad_token_and_action() {
        let app = app(3).await;

        let (status, body) = send(&app, post("/api/admin/search/index", json!({"action": "create", "token": "nope"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);

        let (status, _) = send(&app, control("rebuild")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, control("index-single-item")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "item_id is required");
    }

    #[tokio::test]
    async fn test_build_loop_until_created() {
        let app = app(25).await;
        let mut statuses = Vec::new();
        for _ in 0..5 {
            let (status, body) = send(&app, control("create")).await;
            assert_eq!(status, StatusCode::OK);
            let data = &body["data"];
            statuses.push(data["status"].as_str().unwrap().to_string());
            if data["status"] == "created" {
                assert_eq!(data["percent"], 100);
                assert_eq!(data["indexed"], 25);
                break;
            }
        }
        assert_eq!(statuses, vec!["creating", "creating", "created"]);

        let (status, body) = send(&app, get_with_token("/api/admin/search/status", TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["offset"], 25);

        let (status, _) = send(&app, get_with_token("/api/admin/search/status", "wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_transition_and_busy() {
        let app = app(5).await;

        let (status, body) = send(&app, control("pause")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["status"], "empty");

        sqlx::query("UPDATE search_build_state SET lock_owner = 'other', lock_acquired_at = ? WHERE id = 1")
            .bind(chrono::Utc::now().timestamp())
            .execute(app.state.build.index().pool())
            .await
            .unwrap();
        let (status, body) = send(&app, control("create")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 409);
        assert_eq!(body["data"]["status"], "empty");
    }

    #[tokio::test]
    async fn test_delete_returns_label() {
        let app = app(5).await;
        send(&app, control("create")).await;

        let (status, body) = send(&app, control("delete")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "empty");
        assert_eq!(body["data"]["control_label"], "Create index");
    }

    #[tokio::test]
    async fn test_single_item_and_errors() {
        let app = app(5).await;
        send(&app, control("create")).await;

        let request = post(
            "/api/admin/search/index",
            json!({"action": "index-single-item", "token": TOKEN, "item_id": 2}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["item_id"], 2);
        assert_eq!(body["data"]["outcome"], "indexed");

        let (status, body) = send(&app, get_with_token("/api/admin/search/errors", TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_search_and_suggest() {
        let app = app(5).await;

        let (status, body) = send(&app, post("/api/search", json!({"query": "wireless mouse"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "fallback");
        assert_eq!(body["data"]["hits"][0]["title"], "<mark>Wireless</mark> <mark>Mouse</mark> Pro");

        send(&app, control("create")).await;
        let (_, body) = send(&app, post("/api/search", json!({"query": "wireless mouse"}))).await;
        assert_eq!(body["data"]["source"], "index");
        assert_eq!(body["data"]["has_more"], false);

        let request = Request::builder().uri("/api/search/suggest?q=wir").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["suggestion"], "wireless");

        let request = Request::builder().uri("/api/search/suggest?q=w").body(Body::empty()).unwrap();
        let (_, body) = send(&app, request).await;
        assert_eq!(body["data"]["suggestion"], "");
        assert_eq!(body["data"]["suggestions"], json!([]));
    }

    #[tokio::test]
    async fn test_search_without_query_is_neutral() {
        let app = app(3).await;
        let (status, body) = send(&app, post("/api/search", json!({"types": ["post"]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "none");
        assert_eq!(body["data"]["hits"], json!([]));
        assert_eq!(body["data"]["has_more"], false);
    }
}

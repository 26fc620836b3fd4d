use super::*;
use crate::config::ClientConfig;
use crate::net::test_helpers::spawn_server;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

fn boards_router() -> Router {
    Router::new()
        .route(
            "/boards",
            get(|| async { Json(json!([{ "id": "b1", "name": "Roadmap" }])) }).post(|| async { Json(json!("b2")) }),
        )
        .route(
            "/boards/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({ "id": id, "name": "Sprint 1", "columns": [], "cards": [] }))
            }),
        )
}

async fn store(app: Router) -> BoardListStore {
    let origin = spawn_server(app).await;
    let config = ClientConfig::default().with_base_url(&origin).unwrap();
    BoardListStore::new(Arc::new(ApiClient::new(&config).unwrap()))
}

#[tokio::test]
async fn request_user_boards_replaces_list() {
    let mut boards = store(boards_router()).await;
    let items = boards.request_user_boards().await.unwrap();
    assert_eq!(items, [BoardSummary { id: "b1".into(), name: "Roadmap".into() }]);
}

#[tokio::test]
async fn add_user_board_appends_fetched_summary() {
    let mut boards = store(boards_router()).await;
    boards.request_user_boards().await.unwrap();

    let added = boards.add_user_board("Sprint 1").await.unwrap();
    assert_eq!(added.id, "b2");
    assert_eq!(boards.items().len(), 2);
    assert_eq!(boards.items()[1].name, "Sprint 1");

    boards.reset();
    assert!(boards.items().is_empty());
}

#[tokio::test]
async fn failed_create_appends_nothing() {
    let app = Router::new().route(
        "/boards",
        post(|| async { Json(json!({ "error_type": "Unauthorized", "error_msg": "Unauthorized" })) }),
    );
    let mut boards = store(app).await;

    let err = boards.add_user_board("Nope").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(boards.items().is_empty());
}

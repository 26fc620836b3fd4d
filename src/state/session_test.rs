use super::*;
use crate::config::ClientConfig;
use crate::net::test_helpers::spawn_server;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Mutex;

/// Auth server with one account (`ann@example.test` / `pw`) whose profile
/// can be edited.
fn auth_router() -> Router {
    let profile = Arc::new(Mutex::new(json!({ "id": "u1", "username": "ann", "profile_url": null, "bio": null })));
    Router::new()
        .route(
            "/api/login",
            post(|State(profile): State<Arc<Mutex<Value>>>, Json(body): Json<Value>| async move {
                if body["email"] == "ann@example.test" && body["password"] == "pw" {
                    let user = profile.lock().unwrap().clone();
                    ([(header::SET_COOKIE, "token=t1; Path=/")], Json(user)).into_response()
                } else {
                    Json(json!({ "error_type": "InvalidCredentials", "error_msg": "Wrong password" })).into_response()
                }
            }),
        )
        .route(
            "/api/register",
            post(|Json(body): Json<Value>| async move {
                (
                    [(header::SET_COOKIE, "token=t2; Path=/")],
                    Json(json!({ "id": "u9", "username": body["username"] })),
                )
            }),
        )
        .route("/api/logout", post(|| async { Json(json!({})) }))
        .route(
            "/api/user",
            get(|State(profile): State<Arc<Mutex<Value>>>, headers: HeaderMap| async move {
                let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
                if cookie.contains("token=t1") {
                    Json(profile.lock().unwrap().clone()).into_response()
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "error_type": "Unauthorized", "error_msg": "Unauthorized" })))
                        .into_response()
                }
            })
            .put(|State(profile): State<Arc<Mutex<Value>>>, Json(body): Json<Value>| async move {
                let mut profile = profile.lock().unwrap();
                profile["username"] = body["username"].clone();
                profile["bio"] = body["bio"].clone();
                Json(profile["id"].clone())
            }),
        )
        .with_state(profile)
}

async fn store() -> SessionStore {
    let origin = spawn_server(auth_router()).await;
    let config = ClientConfig::default().with_base_url(&origin).unwrap();
    SessionStore::new(Arc::new(ApiClient::new(&config).unwrap()))
}

#[tokio::test]
async fn login_replaces_record_and_installs_token() {
    let mut session = store().await;
    assert!(!session.is_signed_in());

    let user = session.login("ann@example.test", "pw").await.unwrap();
    assert_eq!(user.username, "ann");
    assert!(session.is_signed_in());
    assert_eq!(session.api.token().as_deref(), Some("t1"));
}

#[tokio::test]
async fn wrong_password_leaves_record_default() {
    let mut session = store().await;

    let err = session.login("ann@example.test", "nope").await.unwrap_err();
    assert_eq!(err.to_string(), "Wrong password");
    assert_eq!(session.user(), &User::default());
    assert!(session.api.token().is_none());
}

#[tokio::test]
async fn register_signs_in_new_user() {
    let mut session = store().await;
    let user = session.register("zed", "zed@example.test", "pw").await.unwrap();
    assert_eq!((user.id.as_str(), user.username.as_str()), ("u9", "zed"));
}

#[tokio::test]
async fn refresh_without_session_resets_record() {
    let mut session = store().await;
    session.register("zed", "zed@example.test", "pw").await.unwrap();

    // The register token is not accepted by `/api/user`.
    let err = session.refresh().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!session.is_signed_in());
}

#[tokio::test]
async fn update_profile_rereads_record() {
    let mut session = store().await;
    session.login("ann@example.test", "pw").await.unwrap();

    let user = session.update_profile("annie", "", "hello").await.unwrap();
    assert_eq!(user.username, "annie");
    assert_eq!(user.bio.as_deref(), Some("hello"));
}

#[tokio::test]
async fn logout_clears_record_and_token() {
    let mut session = store().await;
    session.login("ann@example.test", "pw").await.unwrap();

    session.logout().await.unwrap();
    assert!(!session.is_signed_in());
    assert!(session.api.token().is_none());
}

use super::*;
use axum::Json;
use axum::Router;
use axum::http::HeaderMap as AxumHeaders;
use axum::routing::{get, post};
use reqwest::header::HeaderValue;
use serde_json::json;

async fn spawn_server(app: Router) -> ClientConfig {
    let origin = crate::net::test_helpers::spawn_server(app).await;
    ClientConfig::default()
        .with_base_url(&origin)
        .expect("valid base url")
}

fn header(headers: &AxumHeaders, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

// =============================================================
// decode_body
// =============================================================

#[test]
fn decode_body_error_msg_on_200_is_failure() {
    let body = r#"{"error_type":"NotFound","error_msg":"Not Found"}"#;
    let err = decode_body::<Board>(200, body).unwrap_err();
    assert!(matches!(err, ClientError::Api { ref message } if message == "Not Found"));
}

#[test]
fn decode_body_unauthorized_type_maps_to_unauthorized() {
    let body = r#"{"error_type":"Unauthorized","error_msg":"Unauthorized"}"#;
    assert!(decode_body::<User>(401, body).unwrap_err().is_unauthorized());
}

#[test]
fn decode_body_without_envelope_succeeds_regardless_of_status() {
    let id: String = decode_body(404, r#""col-1""#).unwrap();
    assert_eq!(id, "col-1");
}

#[test]
fn decode_body_non_json_error_status_is_status_error() {
    let err = decode_body::<Value>(502, "<html>bad gateway</html>").unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 502, .. }));
    assert!(err.retryable());
}

#[test]
fn decode_body_wrong_shape_on_success_is_decode_error() {
    let err = decode_body::<Board>(200, r#"{"unexpected":true}"#).unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

// =============================================================
// Cookies and URLs
// =============================================================

#[test]
fn token_from_headers_reads_token_cookie_only() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
    headers.append(SET_COOKIE, HeaderValue::from_static("token=abc123; Path=/; HttpOnly"));
    assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));
}

#[test]
fn token_from_headers_none_without_token_cookie() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("tokenish=1"));
    assert!(token_from_headers(&headers).is_none());
}

#[test]
fn ws_url_maps_scheme() {
    assert_eq!(ws_url("http://h:1", CHAT_EVENTS_PATH).unwrap(), "ws://h:1/chat_source/events");
    assert_eq!(ws_url("https://h/", CHAT_EVENTS_PATH).unwrap(), "wss://h/chat_source/events");
    assert!(ws_url("ftp://h", CHAT_EVENTS_PATH).is_err());
}

// =============================================================
// Live requests against a mock server
// =============================================================

#[tokio::test]
async fn requests_carry_bearer_and_cookie_token() {
    let app = Router::new().route(
        "/boards/{id}",
        get(|headers: AxumHeaders| async move {
            Json(json!({
                "id": header(&headers, "authorization"),
                "name": header(&headers, "cookie"),
                "columns": [],
                "cards": []
            }))
        }),
    );
    let cfg = spawn_server(app).await.with_token(Some("tok".into()));
    let client = ApiClient::new(&cfg).unwrap();

    let board = client.fetch_board("b1").await.unwrap();
    assert_eq!(board.id, "Bearer tok");
    assert_eq!(board.name, "token=tok");
}

#[tokio::test]
async fn login_installs_token_from_set_cookie() {
    let app = Router::new()
        .route(
            "/api/login",
            post(|| async {
                (
                    [(axum::http::header::SET_COOKIE, "token=fresh; Path=/")],
                    Json(json!({ "id": "u1", "username": "ann", "profile_url": null, "bio": null })),
                )
            }),
        )
        .route(
            "/api/user",
            get(|headers: AxumHeaders| async move {
                Json(json!({ "id": "u1", "username": header(&headers, "cookie") }))
            }),
        );
    let cfg = spawn_server(app).await;
    let client = ApiClient::new(&cfg).unwrap();
    assert!(client.token().is_none());

    let user = client.login("ann@example.test", "pw").await.unwrap();
    assert_eq!(user.username, "ann");
    assert_eq!(client.token().as_deref(), Some("fresh"));

    let me = client.current_user().await.unwrap();
    assert_eq!(me.username, "token=fresh");
}

#[tokio::test]
async fn envelope_error_surfaces_server_message() {
    let app = Router::new().route(
        "/boards/{id}/columns",
        post(|| async { Json(json!({ "error_type": "FailedToParseUUID", "error_msg": "Failed to parse UUID" })) }),
    );
    let cfg = spawn_server(app).await;
    let client = ApiClient::new(&cfg).unwrap();

    let err = client.create_column("not-a-uuid", "Todo", 0).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to parse UUID");
}

#[tokio::test]
async fn find_conversation_splits_conversation_and_members() {
    let app = Router::new().route(
        "/chat_source/conversation/{a}/{b}",
        post(|| async {
            Json(json!([
                { "id": "c1", "member_one": "u1", "member_two": "u2" },
                { "id": "u1", "username": "ann" },
                { "id": "u2", "username": "bob" }
            ]))
        }),
    );
    let cfg = spawn_server(app).await;
    let client = ApiClient::new(&cfg).unwrap();

    let (conversation, members) = client.find_conversation("u1", "u2").await.unwrap();
    assert_eq!(conversation.id, "c1");
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].username, "bob");
}

//! Protocol-level tests against a live router.

use chrono::{Duration, Utc};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

use cipherkeep_server::{create_router, AppState, SessionGuard};
use cipherkeep_storage::{BlobStore, MemoryRecordStore};

struct TestServer {
    base: String,
    state: Arc<AppState>,
    _blobs: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let blobs = TempDir::new().unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(MemoryRecordStore::new()),
            BlobStore::new(blobs.path()).unwrap(),
            SessionGuard::new(std::time::Duration::from_secs(3600)).unwrap(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            state,
            _blobs: blobs,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Sign up `username` and return the raw session cookie pair.
    async fn sign_up(&self, username: &str) -> String {
        let response = reqwest::Client::new()
            .post(self.url("/api/signup"))
            .json(&json!({"username": username, "password": "pw"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_sign_up_sets_session_cookie() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/api/signup"))
        .json(&json!({"username": "alice", "password": "pw"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let server = TestServer::start().await;
    server.sign_up("alice").await;

    let response = reqwest::Client::new()
        .post(server.url("/api/signup"))
        .json(&json!({"username": "alice", "password": "other"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "username is already taken"}));
}

#[tokio::test]
async fn test_wrong_password_is_bare_401() {
    let server = TestServer::start().await;
    server.sign_up("alice").await;

    for (username, password) in [("alice", "wrong"), ("nobody", "pw")] {
        let response = reqwest::Client::new()
            .post(server.url("/api/signin"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.text().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_blank_credentials_rejected() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/api/signup"))
        .json(&json!({"username": " ", "password": "pw"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "username and/or password empty");
}

#[tokio::test]
async fn test_expired_session_is_unauthorized_whatever_the_body() {
    let server = TestServer::start().await;
    server.sign_up("alice").await;
    let user = server.state.store.find_user("alice").await.unwrap().unwrap();

    let expired = server
        .state
        .guard
        .issue_expiring(user.id, Utc::now() - Duration::seconds(5))
        .unwrap();
    let cookie = format!("session={}", expired);
    let client = reqwest::Client::new();

    let garbage = client
        .post(server.url("/api/logins"))
        .header(COOKIE, &cookie)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    assert!(garbage.text().await.unwrap().is_empty());

    let valid_body = client
        .post(server.url("/api/cards"))
        .header(COOKIE, &cookie)
        .json(&json!({"bank": "aa", "number": "bb", "date": "cc", "cvv": "dd", "metainfo": "ee"}))
        .send()
        .await
        .unwrap();
    assert_eq!(valid_body.status(), StatusCode::UNAUTHORIZED);

    for path in ["/api/files", "/api/files/1", "/api/logins"] {
        let response = client.get(server.url(path)).header(COOKIE, &cookie).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", path);
    }
}

#[tokio::test]
async fn test_missing_cookie_is_unauthorized() {
    let server = TestServer::start().await;

    let response = reqwest::get(server.url("/api/logins")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_card_validation_message() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;

    let response = reqwest::Client::new()
        .post(server.url("/api/cards"))
        .header(COOKIE, cookie)
        .json(&json!({"bank": "", "number": "bb", "date": "cc", "cvv": "dd", "metainfo": "ee"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "bank empty"}));
}

#[tokio::test]
async fn test_undecodable_body_not_acceptable() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;

    let response = reqwest::Client::new()
        .post(server.url("/api/logins"))
        .header(COOKIE, cookie)
        .header("content-type", "application/json")
        .body("[1, 2")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_bad_record_id() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;

    let response = reqwest::Client::new()
        .delete(server.url("/api/logins/abc"))
        .header(COOKIE, cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_of_unknown_login_not_found() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;

    let response = reqwest::Client::new()
        .post(server.url("/api/logins"))
        .header(COOKIE, cookie)
        .json(&json!({"id": 77, "username": "aa", "password": "bb", "metainfo": "cc"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_new_file_without_body_rejected() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;

    let form = reqwest::multipart::Form::new()
        .text("id", "0")
        .text("metainfo", "6e6f7465");
    let response = reqwest::Client::new()
        .post(server.url("/api/files"))
        .header(COOKIE, cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "file path empty");
}

#[tokio::test]
async fn test_file_replace_removes_old_blob() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;
    let client = reqwest::Client::new();

    let upload = |id: &str, body: &'static [u8]| {
        reqwest::multipart::Form::new()
            .text("id", id.to_string())
            .text("metainfo", "6e6f7465")
            .part(
                "file",
                reqwest::multipart::Part::bytes(body).file_name("6e616d65"),
            )
    };

    let saved: Value = client
        .post(server.url("/api/files"))
        .header(COOKIE, &cookie)
        .multipart(upload("0", b"first"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = saved["id"].as_i64().unwrap();
    let user = server.state.store.find_user("alice").await.unwrap().unwrap();
    let first_path = server
        .state
        .store
        .find_file(user.id, cipherkeep_common::RecordId::new(id))
        .await
        .unwrap()
        .unwrap()
        .path;

    let response = client
        .post(server.url("/api/files"))
        .header(COOKIE, &cookie)
        .multipart(upload(&id.to_string(), b"second"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!server.state.blobs.root().join(&first_path).exists());

    let body = client
        .get(server.url(&format!("/api/files/{}", id)))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&body[..], b"second");

    let listed: Value = client
        .get(server.url("/api/files"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, json!([{"id": id, "name": "6e616d65", "metainfo": "6e6f7465"}]));
}

fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .map(|path| if path.is_dir() { count_files(&path) } else { 1 })
        .sum()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replacements_leave_one_blob() {
    let server = TestServer::start().await;
    let cookie = server.sign_up("alice").await;
    let client = reqwest::Client::new();

    let form = |id: &str| {
        reqwest::multipart::Form::new()
            .text("id", id.to_string())
            .text("metainfo", "6e6f7465")
            .part(
                "file",
                reqwest::multipart::Part::bytes(b"body".to_vec()).file_name("6e616d65"),
            )
    };

    let saved: Value = client
        .post(server.url("/api/files"))
        .header(COOKIE, &cookie)
        .multipart(form("0"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = saved["id"].as_i64().unwrap().to_string();

    let uploads: Vec<_> = (0..32)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/api/files");
            let cookie = cookie.clone();
            let body = form(&id);
            tokio::spawn(async move {
                client
                    .post(url)
                    .header(COOKIE, cookie)
                    .multipart(body)
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for upload in uploads {
        assert_eq!(upload.await.unwrap(), StatusCode::OK);
    }

    let user = server.state.store.find_user("alice").await.unwrap().unwrap();
    assert_eq!(server.state.store.find_files(user.id).await.unwrap().len(), 1);
    assert_eq!(count_files(server.state.blobs.root()), 1);
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use folio_api::config::{HashingParams, TokenConfig, UploadPolicy};
use folio_api::credentials::PasswordHashing;
use folio_api::session::TokenCarrier;
use folio_api::storage::LocalBlobStore;
use folio_api::tokens::TokenService;
use folio_api::{AppStateInner, router};
use folio_db::Database;

pub const BOUNDARY: &str = "folio-test-boundary";

pub struct TestApp {
    pub router: Router,
    // Blob directory, removed when the test ends.
    blobs: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// All `Set-Cookie` header values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }
}

impl TestApp {
    pub async fn new(carrier: TokenCarrier) -> Self {
        let blobs = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(blobs.path().to_path_buf()).await.unwrap();

        let fast = HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };

        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenService::new(&TokenConfig::insecure_dev()),
            passwords: PasswordHashing::new(&fast).unwrap(),
            blobs: Arc::new(store),
            carrier,
            cookie_secure: false,
            uploads: UploadPolicy::default(),
        });

        Self {
            router: router(state),
            blobs,
        }
    }

    /// Number of blobs currently in the store's directory.
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(self.blobs.path()).unwrap().count()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.bare(Method::GET, uri, token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.bare(Method::DELETE, uri, token).await
    }

    async fn bare(&self, method: Method, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Uploads `files` as `(filename, bytes)` parts named `file`.
    pub async fn upload(&self, project_id: &str, token: &str, files: &[(&str, &[u8])]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/project/{}/documents", project_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap();
        self.send(request).await
    }

    pub async fn register(&self, login: &str) -> TestResponse {
        self.json(
            Method::POST,
            "/auth/register",
            None,
            json!({
                "login": login,
                "email": format!("{}@example.com", login),
                "password": "correct horse battery",
                "password_repeat": "correct horse battery",
            }),
        )
        .await
    }

    pub async fn login(&self, login: &str) -> TestResponse {
        self.json(
            Method::POST,
            "/auth/login",
            None,
            json!({ "login": login, "password": "correct horse battery" }),
        )
        .await
    }

    /// Registers and logs in, returning the access token.
    pub async fn signed_up(&self, login: &str) -> String {
        assert_eq!(self.register(login).await.status, StatusCode::CREATED);
        let response = self.login(login).await;
        assert_eq!(response.status, StatusCode::OK);
        response.json()["access_token"].as_str().unwrap().to_string()
    }

    /// Creates a project as the token's user, returning its id.
    pub async fn project(&self, token: &str, name: &str) -> String {
        let response = self
            .json(
                Method::POST,
                "/projects",
                Some(token),
                json!({ "name": name, "description": "drafts and notes" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["id"].as_str().unwrap().to_string()
    }
}

pub fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

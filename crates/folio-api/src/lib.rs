pub mod access;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod projects;
pub mod session;
pub mod storage;
pub mod tokens;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use folio_db::Database;

use crate::config::UploadPolicy;
use crate::credentials::PasswordHashing;
use crate::session::TokenCarrier;
use crate::storage::BlobStore;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub passwords: PasswordHashing,
    pub blobs: Arc<dyn BlobStore>,
    pub carrier: TokenCarrier,
    pub cookie_secure: bool,
    pub uploads: UploadPolicy,
}

/// Full HTTP surface. Everything except registration, login, refresh,
/// logout and the health check sits behind [`session::require_auth`].
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/project/{project_id}/info",
            get(projects::get_project).put(projects::update_project),
        )
        .route("/project/{project_id}", axum::routing::delete(projects::delete_project))
        .route("/project/{project_id}/invite", post(projects::invite_user))
        .route(
            "/project/{project_id}/documents",
            get(documents::list_documents)
                .post(documents::upload_documents)
                .layer(DefaultBodyLimit::max(state.uploads.max_bytes)),
        )
        .route(
            "/document/{document_id}",
            get(documents::download_document)
                .put(documents::rename_document)
                .delete(documents::delete_document),
        )
        .layer(middleware::from_fn_with_state(state.clone(), session::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

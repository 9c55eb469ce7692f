use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use folio_db::models::{DocumentRow, NewDocument};
use folio_types::api::{DocumentResponse, MessageResponse, RenameDocumentRequest, UploadResponse};

use crate::AppState;
use crate::access::{self, Action};
use crate::error::{ApiError, ApiResult};
use crate::projects::load_project;
use crate::session::Principal;

pub fn document_response(row: DocumentRow) -> DocumentResponse {
    DocumentResponse {
        id: row.id,
        project_id: row.project_id,
        original_filename: row.original_filename,
        file_type: row.file_type,
        uploaded_by: row.uploader_login.unwrap_or_else(|| "unknown".to_string()),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Lowercased text after the last dot, if there is one.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn content_type(file_type: &str) -> &'static str {
    match file_type {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// `attachment; filename="..."` with anything outside printable ASCII, and
/// the quote and backslash characters, replaced by `_`.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

fn load_document(state: &AppState, document_id: Uuid) -> ApiResult<DocumentRow> {
    state
        .db
        .get_document_by_id(document_id)?
        .ok_or_else(|| ApiError::NotFound("document not found".into()))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<DocumentResponse>>> {
    load_project(&state.db, project_id)?;
    access::require(&state.db, principal.user_id(), project_id, Action::ListDocuments)?;

    let documents = state
        .db
        .list_project_documents(project_id)?
        .into_iter()
        .map(document_response)
        .collect();

    Ok(Json(documents))
}

struct PendingUpload {
    filename: String,
    extension: String,
    bytes: Bytes,
}

/// Multipart body with one part per file.
/// Every part is checked before anything is stored, so a rejected batch
/// leaves no documents behind.
pub async fn upload_documents(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    load_project(&state.db, project_id)?;
    access::require(&state.db, principal.user_id(), project_id, Action::UploadDocument)?;

    let mut pending = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let extension = file_extension(&filename)
            .filter(|ext| state.uploads.allows(ext))
            .ok_or_else(|| {
                ApiError::Validation(format!("file type of {:?} is not allowed", filename))
            })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read upload: {}", e)))?;

        pending.push(PendingUpload {
            filename,
            extension,
            bytes,
        });
    }

    if pending.is_empty() {
        return Err(ApiError::Validation("no files uploaded".into()));
    }

    let mut documents = Vec::with_capacity(pending.len());
    for upload in pending {
        let locator = state.blobs.store(&upload.bytes, &upload.extension).await?;

        let created = state.db.create_document(&NewDocument {
            id: Uuid::new_v4(),
            project_id,
            locator: &locator,
            original_filename: &upload.filename,
            file_type: &upload.extension,
            uploaded_by: principal.user_id(),
        });
        let row = match created {
            Ok(row) => row,
            Err(e) => {
                if let Err(cleanup) = state.blobs.delete(&locator).await {
                    error!(%locator, "Failed to remove orphaned blob: {:#}", cleanup);
                }
                return Err(e.into());
            }
        };

        info!(document_id = %row.id, %project_id, size = upload.bytes.len(), "Stored document");
        documents.push(document_response(row));
    }

    Ok((StatusCode::CREATED, Json(UploadResponse { documents })))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, document_id)?;
    access::require(&state.db, principal.user_id(), document.project_id, Action::DownloadDocument)?;

    let bytes = state
        .blobs
        .read(&document.locator)
        .await?
        .ok_or_else(|| {
            warn!(%document_id, locator = %document.locator, "Document blob missing");
            ApiError::NotFound("file not found on server".into())
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&document.file_type).to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&document.original_filename)),
        ],
        bytes,
    ))
}

pub async fn rename_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RenameDocumentRequest>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = load_document(&state, document_id)?;
    access::require(&state.db, principal.user_id(), document.project_id, Action::RenameDocument)?;

    let filename = req.original_filename.trim();
    if filename.is_empty() {
        return Err(ApiError::Validation("filename must not be empty".into()));
    }

    let renamed = state
        .db
        .update_document(document_id, filename)?
        .ok_or_else(|| ApiError::NotFound("document not found".into()))?;

    Ok(Json(document_response(renamed)))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<MessageResponse>> {
    let document = load_document(&state, document_id)?;
    access::require(&state.db, principal.user_id(), document.project_id, Action::DeleteDocument)?;

    let locator = state
        .db
        .delete_document(document_id)?
        .ok_or_else(|| ApiError::NotFound("document not found".into()))?;

    if let Err(e) = state.blobs.delete(&locator).await {
        warn!(%document_id, %locator, "Failed to release blob: {:#}", e);
    }

    info!(%document_id, project_id = %document.project_id, "Deleted document");
    Ok(Json(MessageResponse {
        message: "document deleted".into(),
    }))
}

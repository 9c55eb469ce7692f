use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use folio_db::Database;
use folio_db::models::ProjectRow;
use folio_types::api::{
    CreateProjectRequest, InviteRequest, MessageResponse, ProjectResponse, UpdateProjectRequest,
};
use folio_types::models::Role;

use crate::AppState;
use crate::access::{self, Action};
use crate::documents::document_response;
use crate::error::{ApiError, ApiResult};
use crate::session::Principal;

/// Resolves the project or fails with `NotFound`. Handlers call this
/// before the role check.
pub(crate) fn load_project(db: &Database, project_id: Uuid) -> ApiResult<ProjectRow> {
    db.get_project_by_id(project_id)?
        .ok_or_else(|| ApiError::NotFound("project not found".into()))
}

fn project_response(db: &Database, project: ProjectRow, role: Role) -> ApiResult<ProjectResponse> {
    let documents = db
        .list_project_documents(project.id)?
        .into_iter()
        .map(document_response)
        .collect();

    Ok(ProjectResponse {
        id: project.id,
        name: project.name,
        description: project.description,
        owner_id: project.owner_id,
        role,
        created_at: project.created_at,
        updated_at: project.updated_at,
        documents,
    })
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = state
        .db
        .list_user_projects(principal.user_id())?
        .into_iter()
        .map(|member| project_response(&state.db, member.project, member.role))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("project name must not be empty".into()));
    }

    let project = state
        .db
        .create_project(Uuid::new_v4(), name, &req.description, principal.user_id())?;
    info!(project_id = %project.id, owner_id = %principal.user_id(), "Created project");

    let response = project_response(&state.db, project, Role::Owner)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = load_project(&state.db, project_id)?;
    let role = access::require(&state.db, principal.user_id(), project_id, Action::ViewProject)?;

    Ok(Json(project_response(&state.db, project, role)?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    load_project(&state.db, project_id)?;
    let role = access::require(&state.db, principal.user_id(), project_id, Action::UpdateProject)?;

    let name = req.name.as_deref().map(str::trim);
    let project = state
        .db
        .update_project(project_id, name, req.description.as_deref())?
        .ok_or_else(|| ApiError::NotFound("project not found".into()))?;

    Ok(Json(project_response(&state.db, project, role)?))
}

/// Deletes the project with its access rows and documents, then releases
/// the document blobs.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<MessageResponse>> {
    load_project(&state.db, project_id)?;
    access::require(&state.db, principal.user_id(), project_id, Action::DeleteProject)?;

    let locators = state
        .db
        .delete_project(project_id)?
        .ok_or_else(|| ApiError::NotFound("project not found".into()))?;

    for locator in &locators {
        // Rows are already gone; a leftover blob is only wasted space.
        if let Err(e) = state.blobs.delete(locator).await {
            warn!(%project_id, %locator, "Failed to release blob: {:#}", e);
        }
    }

    info!(%project_id, documents = locators.len(), "Deleted project");
    Ok(Json(MessageResponse {
        message: "project deleted".into(),
    }))
}

pub async fn invite_user(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<impl IntoResponse> {
    load_project(&state.db, project_id)?;
    access::require(&state.db, principal.user_id(), project_id, Action::InviteUser)?;

    let invitee = state
        .db
        .get_user_by_login(req.login.trim())?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    access::grant(&state.db, invitee.id, project_id, Role::Participant)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("user {} invited", invitee.login),
        }),
    ))
}

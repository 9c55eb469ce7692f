//! Database row types. These map directly to SQLite rows.
//! Distinct from folio-types API models to keep the DB layer independent.
use chrono::{DateTime, Utc};
use folio_types::models::Role;
use uuid::Uuid;

#[derive(Debug)]
pub struct UserRow {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project as seen by one user, together with that user's role on it.
pub struct MemberProjectRow {
    pub project: ProjectRow,
    pub role: Role,
}

pub struct DocumentRow {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Blob store locator for the file bytes.
    pub locator: String,
    pub original_filename: String,
    pub file_type: String,
    /// Uploader's login, resolved through a join; `None` once the uploader is gone.
    pub uploader_login: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewDocument<'a> {
    pub id: Uuid,
    pub project_id: Uuid,
    pub locator: &'a str,
    pub original_filename: &'a str,
    pub file_type: &'a str,
    pub uploaded_by: Uuid,
}

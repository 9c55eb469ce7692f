use crate::Database;
use crate::models::{DocumentRow, MemberProjectRow, NewDocument, ProjectRow, UserRow};
use anyhow::Result;
use chrono::Utc;
use folio_types::models::Role;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.owner_id, p.created_at, p.updated_at";

const DOCUMENT_SELECT: &str = "SELECT d.id, d.project_id, d.locator, d.original_filename, d.file_type,
            u.login, d.created_at, d.updated_at
     FROM documents d
     LEFT JOIN users u ON d.uploaded_by = u.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: Uuid, login: &str, email: &str, password_hash: &str) -> Result<UserRow> {
        let created_at = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, login, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), login, email, password_hash, created_at],
            )?;
            Ok(UserRow {
                id,
                login: login.to_string(),
                email: email.to_string(),
                password: password_hash.to_string(),
                created_at,
            })
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "login", login))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    // -- Projects --

    /// Inserts the project and its owner access row in one transaction.
    /// Either both rows exist afterwards or neither does.
    pub fn create_project(&self, id: Uuid, name: &str, description: &str, owner_id: Uuid) -> Result<ProjectRow> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO projects (id, name, description, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), name, description, owner_id.to_string(), now],
            )?;
            tx.execute(
                "INSERT INTO project_access (user_id, project_id, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![owner_id.to_string(), id.to_string(), Role::Owner.as_str(), now],
            )?;
            tx.commit()?;

            Ok(ProjectRow {
                id,
                name: name.to_string(),
                description: description.to_string(),
                owner_id,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_project_by_id(&self, id: Uuid) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, id))
    }

    /// Every project the user holds any role on, oldest first.
    pub fn list_user_projects(&self, user_id: Uuid) -> Result<Vec<MemberProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS}, a.role
                 FROM projects p
                 JOIN project_access a ON a.project_id = p.id
                 WHERE a.user_id = ?1
                 ORDER BY p.rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(MemberProjectRow {
                        project: map_project(row)?,
                        role: role_at(row, 6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies the non-empty fields and bumps `updated_at`.
    /// Returns `None` when the project does not exist.
    pub fn update_project(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<ProjectRow>> {
        let name = name.filter(|n| !n.is_empty());
        let description = description.filter(|d| !d.is_empty());
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE projects
                 SET name = COALESCE(?2, name),
                     description = COALESCE(?3, description),
                     updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), name, description, Utc::now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_project(conn, id)
        })
    }

    /// Deletes the project; access rows and documents go with it through
    /// `ON DELETE CASCADE`. Returns the blob locators of the removed
    /// documents so the caller can release them, or `None` if there was no
    /// such project.
    pub fn delete_project(&self, id: Uuid) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let locators = {
                let mut stmt = tx.prepare("SELECT locator FROM documents WHERE project_id = ?1")?;
                stmt.query_map([id.to_string()], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            let deleted = tx.execute("DELETE FROM projects WHERE id = ?1", [id.to_string()])?;
            tx.commit()?;

            Ok((deleted > 0).then_some(locators))
        })
    }

    // -- Access --

    pub fn get_access(&self, user_id: Uuid, project_id: Uuid) -> Result<Option<Role>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT role FROM project_access WHERE user_id = ?1 AND project_id = ?2",
                [user_id.to_string(), project_id.to_string()],
                |row| role_at(row, 0),
            )
            .optional()
        })
    }

    /// Inserts an access row. Returns `false` and changes nothing when the
    /// user already has a row for this project.
    pub fn grant_access(&self, user_id: Uuid, project_id: Uuid, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO project_access (user_id, project_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, project_id) DO NOTHING",
                rusqlite::params![user_id.to_string(), project_id.to_string(), role.as_str(), Utc::now()],
            )?;
            Ok(inserted == 1)
        })
    }

    // -- Documents --

    pub fn create_document(&self, doc: &NewDocument<'_>) -> Result<DocumentRow> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents
                    (id, project_id, locator, original_filename, file_type, uploaded_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    doc.id.to_string(),
                    doc.project_id.to_string(),
                    doc.locator,
                    doc.original_filename,
                    doc.file_type,
                    doc.uploaded_by.to_string(),
                    now,
                ],
            )?;
            query_document(conn, doc.id)?
                .ok_or_else(|| anyhow::anyhow!("Document {} vanished after insert", doc.id))
        })
    }

    pub fn get_document_by_id(&self, id: Uuid) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| query_document(conn, id))
    }

    pub fn list_project_documents(&self, project_id: Uuid) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{DOCUMENT_SELECT} WHERE d.project_id = ?1 ORDER BY d.rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([project_id.to_string()], map_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Renames the document. Returns `None` when it does not exist.
    pub fn update_document(&self, id: Uuid, original_filename: &str) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE documents SET original_filename = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), original_filename, Utc::now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_document(conn, id)
        })
    }

    /// Removes the row and returns its blob locator, or `None` if absent.
    pub fn delete_document(&self, id: Uuid) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let locator = tx
                .query_row("SELECT locator FROM documents WHERE id = ?1", [id.to_string()], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            if locator.is_some() {
                tx.execute("DELETE FROM documents WHERE id = ?1", [id.to_string()])?;
            }
            tx.commit()?;
            Ok(locator)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is one of a fixed set of literals chosen by the callers above.
    let sql = format!("SELECT id, login, email, password, created_at FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: uuid_at(row, 0)?,
                login: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_project(conn: &Connection, id: Uuid) -> Result<Option<ProjectRow>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?1");
    conn.query_row(&sql, [id.to_string()], map_project).optional()
}

fn query_document(conn: &Connection, id: Uuid) -> Result<Option<DocumentRow>> {
    let sql = format!("{DOCUMENT_SELECT} WHERE d.id = ?1");
    conn.query_row(&sql, [id.to_string()], map_document).optional()
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: uuid_at(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: uuid_at(row, 0)?,
        project_id: uuid_at(row, 1)?,
        locator: row.get(2)?,
        original_filename: row.get(3)?,
        file_type: row.get(4)?,
        uploader_login: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn role_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    Role::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown role {raw:?}").into())
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

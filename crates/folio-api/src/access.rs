//! Role-based access control over projects.
//!
//! A user's role on a project is whatever the single access row for the
//! `(user, project)` pair says; no row means no access at all.

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use folio_db::Database;
use folio_types::models::Role;

use crate::error::ApiError;

const ANY_MEMBER: &[Role] = &[Role::Owner, Role::Participant];
const OWNER_ONLY: &[Role] = &[Role::Owner];

/// Project-scoped operations that need a role. Creating a project is not
/// listed: any authenticated user may do it and becomes its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewProject,
    ListDocuments,
    DownloadDocument,
    UpdateProject,
    DeleteProject,
    InviteUser,
    RenameDocument,
    DeleteDocument,
    UploadDocument,
}

impl Action {
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Action::ViewProject
            | Action::ListDocuments
            | Action::DownloadDocument
            | Action::RenameDocument
            | Action::DeleteDocument
            | Action::UploadDocument => ANY_MEMBER,
            Action::UpdateProject | Action::DeleteProject | Action::InviteUser => OWNER_ONLY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ViewProject => "view project",
            Action::ListDocuments => "list documents",
            Action::DownloadDocument => "download document",
            Action::UpdateProject => "update project",
            Action::DeleteProject => "delete project",
            Action::InviteUser => "invite user",
            Action::RenameDocument => "rename document",
            Action::DeleteDocument => "delete document",
            Action::UploadDocument => "upload document",
        }
    }
}

pub fn role_of(db: &Database, user_id: Uuid, project_id: Uuid) -> Result<Option<Role>> {
    db.get_access(user_id, project_id)
}

/// The single policy decision shared by [`authorize`] and [`require`].
pub fn permits(role: Role, required: &[Role]) -> bool {
    required.contains(&role)
}

/// True iff the user has a role on the project and it is in `required`.
pub fn authorize(db: &Database, user_id: Uuid, project_id: Uuid, required: &[Role]) -> Result<bool> {
    Ok(role_of(db, user_id, project_id)?.is_some_and(|role| permits(role, required)))
}

/// Gate for route handlers: returns the caller's role, or an
/// authorization error when the policy for `action` is not met.
pub fn require(db: &Database, user_id: Uuid, project_id: Uuid, action: Action) -> Result<Role, ApiError> {
    match role_of(db, user_id, project_id)? {
        Some(role) if permits(role, action.required_roles()) => Ok(role),
        Some(role) => {
            warn!(%user_id, %project_id, %role, action = action.as_str(), "Access denied: insufficient role");
            Err(ApiError::Authorization(format!("{} requires the project owner", action.as_str())))
        }
        None => {
            warn!(%user_id, %project_id, action = action.as_str(), "Access denied: no access to project");
            Err(ApiError::Authorization("no access to this project".into()))
        }
    }
}

/// Adds an access row. A user who already has one is a conflict; the
/// existing role is never changed.
pub fn grant(db: &Database, user_id: Uuid, project_id: Uuid, role: Role) -> Result<(), ApiError> {
    if !db.grant_access(user_id, project_id, role)? {
        return Err(ApiError::Conflict("user already has access to this project".into()));
    }
    info!(%user_id, %project_id, %role, "Granted project access");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        alice: Uuid,
        bob: Uuid,
        project: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(alice, "alice", "alice@example.com", "hash").unwrap();
        db.create_user(bob, "bob", "bob@example.com", "hash").unwrap();
        let project = db.create_project(Uuid::new_v4(), "Docs", "", alice).unwrap().id;
        Fixture { db, alice, bob, project }
    }

    #[test]
    fn creator_is_owner_and_others_have_nothing() {
        let f = fixture();

        assert_eq!(role_of(&f.db, f.alice, f.project).unwrap(), Some(Role::Owner));
        assert!(authorize(&f.db, f.alice, f.project, OWNER_ONLY).unwrap());

        assert_eq!(role_of(&f.db, f.bob, f.project).unwrap(), None);
        assert!(!authorize(&f.db, f.bob, f.project, OWNER_ONLY).unwrap());
        assert!(!authorize(&f.db, f.bob, f.project, ANY_MEMBER).unwrap());
    }

    #[test]
    fn invited_participant_passes_member_actions_only() {
        let f = fixture();
        grant(&f.db, f.bob, f.project, Role::Participant).unwrap();

        for action in [
            Action::ViewProject,
            Action::ListDocuments,
            Action::DownloadDocument,
            Action::RenameDocument,
            Action::DeleteDocument,
            Action::UploadDocument,
        ] {
            assert_eq!(require(&f.db, f.bob, f.project, action).unwrap(), Role::Participant);
        }

        for action in [Action::UpdateProject, Action::DeleteProject, Action::InviteUser] {
            assert!(matches!(
                require(&f.db, f.bob, f.project, action),
                Err(ApiError::Authorization(_))
            ));
            assert_eq!(require(&f.db, f.alice, f.project, action).unwrap(), Role::Owner);
        }
    }

    #[test]
    fn require_and_authorize_agree() {
        let f = fixture();
        grant(&f.db, f.bob, f.project, Role::Participant).unwrap();
        let stranger = Uuid::new_v4();

        for user in [f.alice, f.bob, stranger] {
            for action in [
                Action::ViewProject,
                Action::UploadDocument,
                Action::UpdateProject,
                Action::InviteUser,
            ] {
                assert_eq!(
                    require(&f.db, user, f.project, action).is_ok(),
                    authorize(&f.db, user, f.project, action.required_roles()).unwrap(),
                    "{:?}",
                    action
                );
            }
        }
    }

    #[test]
    fn stranger_is_denied_everything() {
        let f = fixture();
        assert!(matches!(
            require(&f.db, f.bob, f.project, Action::ViewProject),
            Err(ApiError::Authorization(_))
        ));
    }

    #[test]
    fn second_invite_is_a_conflict() {
        let f = fixture();
        grant(&f.db, f.bob, f.project, Role::Participant).unwrap();

        assert!(matches!(
            grant(&f.db, f.bob, f.project, Role::Participant),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            grant(&f.db, f.alice, f.project, Role::Participant),
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(role_of(&f.db, f.bob, f.project).unwrap(), Some(Role::Participant));
        assert_eq!(role_of(&f.db, f.alice, f.project).unwrap(), Some(Role::Owner));
    }

    #[test]
    fn deleting_the_project_revokes_everyone() {
        let f = fixture();
        grant(&f.db, f.bob, f.project, Role::Participant).unwrap();
        f.db.delete_project(f.project).unwrap();

        assert_eq!(role_of(&f.db, f.alice, f.project).unwrap(), None);
        assert_eq!(role_of(&f.db, f.bob, f.project).unwrap(), None);
        assert!(!authorize(&f.db, f.alice, f.project, ANY_MEMBER).unwrap());
    }
}

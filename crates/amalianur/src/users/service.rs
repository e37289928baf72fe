use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::store::RepositoryError;

use super::domain::{ActivityLog, CreateUserRequest, Role, UserAccount, UserId};
use super::repository::UserRepository;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("Email required")]
    EmailRequired,
    #[error("ID user wajib dikirim.")]
    IdRequired,
    #[error("user tidak ditemukan")]
    NotFound,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for UserError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

static USER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_user_id() -> UserId {
    let id = USER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    UserId(format!("usr-{id:06}"))
}

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Role stored for `email`. Signed-in accounts without a row are editors.
    pub fn role_of(&self, email: &str) -> Result<Role, UserError> {
        Ok(self
            .repository
            .find_by_email(email)?
            .map(|account| account.role)
            .unwrap_or(Role::Editor))
    }

    /// Create or refresh an account keyed by e-mail.
    pub fn create_user(
        &self,
        request: CreateUserRequest,
        actor: &str,
    ) -> Result<UserAccount, UserError> {
        let email = request.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(UserError::EmailRequired);
        }
        let role = request
            .role
            .as_deref()
            .map(Role::parse_lenient)
            .unwrap_or(Role::Admin);

        let existing = self.repository.find_by_email(&email)?;
        let account = UserAccount {
            id: existing
                .as_ref()
                .map(|account| account.id.clone())
                .unwrap_or_else(next_user_id),
            email: email.clone(),
            name: request
                .full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            role,
            created_at: existing
                .map(|account| account.created_at)
                .unwrap_or_else(Utc::now),
        };
        let stored = self.repository.upsert(account)?;
        self.record_activity(actor, "Create User", format!("Membuat user {email}"));
        info!(id = %stored.id, role = stored.role.as_str(), "user provisioned");
        Ok(stored)
    }

    pub fn delete_user(&self, id: &str, actor: &str) -> Result<(), UserError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(UserError::IdRequired);
        }
        self.repository.delete(&UserId(id.to_string()))?;
        self.record_activity(actor, "Delete User", format!("Menghapus user dengan ID {id}"));
        info!(id, actor, "user deleted");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<UserAccount>, UserError> {
        Ok(self.repository.list()?)
    }

    pub fn activity(&self) -> Result<Vec<ActivityLog>, UserError> {
        Ok(self.repository.activity()?)
    }

    /// Ensure `email` exists as a super admin. Used at startup.
    pub fn bootstrap_super_admin(&self, email: &str) -> Result<UserAccount, UserError> {
        self.create_user(
            CreateUserRequest {
                email: email.to_string(),
                full_name: Some("Super Admin".to_string()),
                role: Some(Role::SuperAdmin.as_str().to_string()),
            },
            "system",
        )
    }

    fn record_activity(&self, actor: &str, action: &str, details: String) {
        let actor = if actor.trim().is_empty() {
            "Super Admin"
        } else {
            actor
        };
        let entry = ActivityLog {
            actor: actor.to_string(),
            action: action.to_string(),
            details,
            created_at: Utc::now(),
        };
        if let Err(error) = self.repository.append_activity(entry) {
            warn!(%error, action, "activity log not written");
        }
    }
}

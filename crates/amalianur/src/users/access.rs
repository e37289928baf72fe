use axum::http::HeaderMap;
use serde::Serialize;

use super::domain::Role;
use super::service::{UserError, UserService};

/// Header carrying the signed-in user's e-mail.
///
/// The value is trusted as-is. Only the authenticating proxy in front of the
/// service may set it, and the proxy must drop any copy sent by the client.
pub const USER_HEADER: &str = "x-user-email";
pub const LOGIN_PATH: &str = "/admin/login";
pub const UNAUTHORIZED_PATH: &str = "/admin/unauthorized";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Silakan login terlebih dahulu.")]
    Unauthenticated,
    #[error("Anda tidak memiliki akses ke halaman ini.")]
    Forbidden { role: Role },
    #[error(transparent)]
    Directory(#[from] UserError),
}

impl AccessError {
    /// Page the client should navigate to, if any.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => Some(LOGIN_PATH),
            Self::Forbidden { .. } => Some(UNAUTHORIZED_PATH),
            Self::Directory(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct RoleGate {
    users: UserService,
}

impl RoleGate {
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// Resolve [`USER_HEADER`] into an identity allowed by `allowed`. A
    /// signed-in e-mail without an account row is an editor.
    pub fn authorize(&self, headers: &HeaderMap, allowed: &[Role]) -> Result<Identity, AccessError> {
        let email = headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AccessError::Unauthenticated)?;

        let role = self.users.role_of(email)?;
        if !allowed.contains(&role) {
            return Err(AccessError::Forbidden { role });
        }
        Ok(Identity {
            email: email.to_string(),
            role,
        })
    }
}

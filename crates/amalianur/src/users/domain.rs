use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
}

impl Role {
    /// Roles allowed to manage enrollment records and settings.
    pub const ENROLLMENT: &'static [Role] = &[Role::SuperAdmin, Role::Admin];
    pub const USER_MANAGEMENT: &'static [Role] = &[Role::SuperAdmin];
    pub const CONTENT: &'static [Role] = &[Role::SuperAdmin, Role::Admin, Role::Editor];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Editor => "editor",
        }
    }

    /// Unknown values read as the least privileged role.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" => Self::SuperAdmin,
            "admin" => Self::Admin,
            _ => Self::Editor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Defaults to `admin`.
    #[serde(default)]
    pub role: Option<String>,
}

/// Row of `activity_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub actor: String,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

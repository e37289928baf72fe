//! Back-office accounts, roles, and the access gate in front of admin routes.

pub mod access;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use access::{AccessError, Identity, RoleGate, USER_HEADER};
pub use domain::{ActivityLog, CreateUserRequest, Role, UserAccount, UserId};
pub use repository::{MemoryUserRepository, UserRepository};
pub use router::user_router;
pub use service::{UserError, UserService};

#[cfg(test)]
mod tests;

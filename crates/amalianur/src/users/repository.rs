use std::sync::Mutex;

use crate::store::{lock, RepositoryError};

use super::domain::{ActivityLog, UserAccount, UserId};

pub trait UserRepository: Send + Sync {
    /// Insert or replace by id.
    fn upsert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError>;
    fn find(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    fn list(&self) -> Result<Vec<UserAccount>, RepositoryError>;
    fn delete(&self, id: &UserId) -> Result<(), RepositoryError>;
    fn append_activity(&self, entry: ActivityLog) -> Result<(), RepositoryError>;
    fn activity(&self) -> Result<Vec<ActivityLog>, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    accounts: Mutex<Vec<UserAccount>>,
    activity: Mutex<Vec<ActivityLog>>,
}

impl UserRepository for MemoryUserRepository {
    fn upsert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut accounts = lock(&self.accounts)?;
        match accounts.iter_mut().find(|existing| existing.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => accounts.push(account.clone()),
        }
        Ok(account)
    }

    fn find(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(lock(&self.accounts)?
            .iter()
            .find(|account| &account.id == id)
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(lock(&self.accounts)?
            .iter()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn list(&self) -> Result<Vec<UserAccount>, RepositoryError> {
        let mut accounts = lock(&self.accounts)?.clone();
        accounts.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(accounts)
    }

    fn delete(&self, id: &UserId) -> Result<(), RepositoryError> {
        let mut accounts = lock(&self.accounts)?;
        let position = accounts
            .iter()
            .position(|account| &account.id == id)
            .ok_or(RepositoryError::NotFound)?;
        accounts.remove(position);
        Ok(())
    }

    fn append_activity(&self, entry: ActivityLog) -> Result<(), RepositoryError> {
        lock(&self.activity)?.push(entry);
        Ok(())
    }

    fn activity(&self) -> Result<Vec<ActivityLog>, RepositoryError> {
        Ok(lock(&self.activity)?.clone())
    }
}

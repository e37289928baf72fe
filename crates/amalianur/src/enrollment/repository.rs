use crate::feed::{ChangeFeed, Subscription};
use crate::store::RepositoryError;

use super::domain::{
    Applicant, EnrollmentRecord, EnrollmentSettings, FeeSchedule, FormCopy, LandingPage,
    NotificationLog, RecordId, SingletonRow,
};

/// Table that logically holds one row, read as "the most recently updated".
pub trait SingletonStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    fn latest(&self) -> Result<Option<SingletonRow<T>>, RepositoryError>;
    /// Creates the row. Fails with [`RepositoryError::Duplicate`] once it exists.
    fn insert(&self, value: T) -> Result<SingletonRow<T>, RepositoryError>;
    fn update(&self, id: &str, value: T) -> Result<SingletonRow<T>, RepositoryError>;
    /// Get-or-create in one step: `apply` runs on the stored value, or on `seed`
    /// when the table is empty, while the table stays locked.
    fn upsert<F>(&self, seed: T, apply: F) -> Result<SingletonRow<T>, RepositoryError>
    where
        F: FnOnce(T) -> T;
    fn feed(&self) -> &ChangeFeed<SingletonRow<T>>;

    fn subscribe(&self) -> Subscription<SingletonRow<T>> {
        SingletonStore::<T>::feed(self).subscribe()
    }
}

/// Storage abstraction for the enrollment tables so services and routers can be
/// exercised against any backend.
pub trait EnrollmentRepository:
    SingletonStore<FeeSchedule>
    + SingletonStore<EnrollmentSettings>
    + SingletonStore<FormCopy>
    + SingletonStore<LandingPage>
    + Send
    + Sync
{
    fn insert_record(&self, applicant: Applicant) -> Result<EnrollmentRecord, RepositoryError>;
    fn fetch_record(&self, id: &RecordId) -> Result<Option<EnrollmentRecord>, RepositoryError>;
    /// Newest first.
    fn list_records(&self) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    /// Fails with [`RepositoryError::ForeignKey`] while notification-log rows still
    /// reference the record.
    fn delete_record(&self, id: &RecordId) -> Result<(), RepositoryError>;
    fn record_feed(&self) -> &ChangeFeed<EnrollmentRecord>;

    /// Fails with [`RepositoryError::ForeignKey`] when the record is gone.
    fn append_notification_log(&self, log: NotificationLog) -> Result<(), RepositoryError>;
    fn notification_logs(&self, id: &RecordId) -> Result<Vec<NotificationLog>, RepositoryError>;
    /// Returns how many rows were removed.
    fn delete_notification_logs(&self, id: &RecordId) -> Result<usize, RepositoryError>;
}

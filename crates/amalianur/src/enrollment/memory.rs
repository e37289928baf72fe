//! In-process tables backing the enrollment workflow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::feed::{ChangeEvent, ChangeFeed};
use crate::store::{lock, RepositoryError};

use super::domain::{
    Applicant, EnrollmentRecord, EnrollmentSettings, FeeSchedule, FormCopy, LandingPage,
    NotificationLog, RecordId, SingletonRow,
};
use super::repository::{EnrollmentRepository, SingletonStore};

struct SingletonTable<T> {
    prefix: &'static str,
    rows: Mutex<Vec<SingletonRow<T>>>,
    feed: ChangeFeed<SingletonRow<T>>,
    sequence: AtomicU64,
}

impl<T> SingletonTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(table: &'static str, prefix: &'static str) -> Self {
        Self {
            prefix,
            rows: Mutex::new(Vec::new()),
            feed: ChangeFeed::new(table),
            sequence: AtomicU64::new(1),
        }
    }

    fn latest(&self) -> Result<Option<SingletonRow<T>>, RepositoryError> {
        let rows = lock(&self.rows)?;
        Ok(rows.iter().max_by_key(|row| row.updated_at).cloned())
    }

    fn insert(&self, value: T) -> Result<SingletonRow<T>, RepositoryError> {
        let mut rows = lock(&self.rows)?;
        if !rows.is_empty() {
            return Err(RepositoryError::Duplicate {
                table: self.feed.table(),
            });
        }
        Ok(self.create(&mut rows, value))
    }

    fn update(&self, id: &str, value: T) -> Result<SingletonRow<T>, RepositoryError> {
        let mut rows = lock(&self.rows)?;
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(self.overwrite(row, value))
    }

    fn upsert<F>(&self, seed: T, apply: F) -> Result<SingletonRow<T>, RepositoryError>
    where
        F: FnOnce(T) -> T,
    {
        let mut rows = lock(&self.rows)?;
        if let Some(row) = rows.first_mut() {
            let value = apply(row.value.clone());
            return Ok(self.overwrite(row, value));
        }
        let value = apply(seed);
        Ok(self.create(&mut rows, value))
    }

    fn create(&self, rows: &mut Vec<SingletonRow<T>>, value: T) -> SingletonRow<T> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let row = SingletonRow {
            id: format!("{}-{sequence}", self.prefix),
            value,
            updated_at: Utc::now(),
        };
        rows.push(row.clone());
        self.feed.publish(ChangeEvent::Insert(row.clone()));
        row
    }

    fn overwrite(&self, row: &mut SingletonRow<T>, value: T) -> SingletonRow<T> {
        row.value = value;
        row.updated_at = Utc::now();
        let updated = row.clone();
        self.feed.publish(ChangeEvent::Update(updated.clone()));
        updated
    }
}

/// Every enrollment table behind its own mutex and change feed.
pub struct MemoryEnrollmentStore {
    records: Mutex<Vec<EnrollmentRecord>>,
    record_feed: ChangeFeed<EnrollmentRecord>,
    record_sequence: AtomicU64,
    notification_logs: Mutex<Vec<NotificationLog>>,
    fees: SingletonTable<FeeSchedule>,
    settings: SingletonTable<EnrollmentSettings>,
    form_copy: SingletonTable<FormCopy>,
    landing: SingletonTable<LandingPage>,
}

impl Default for MemoryEnrollmentStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            record_feed: ChangeFeed::new("pendaftaran"),
            record_sequence: AtomicU64::new(1),
            notification_logs: Mutex::new(Vec::new()),
            fees: SingletonTable::new("biaya_pendaftaran", "fee"),
            settings: SingletonTable::new("pengaturan_pendaftaran", "settings"),
            form_copy: SingletonTable::new("formulir_pendaftaran", "form"),
            landing: SingletonTable::new("daftar", "landing"),
        }
    }
}

impl MemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! singleton_store {
    ($value:ty, $field:ident) => {
        impl SingletonStore<$value> for MemoryEnrollmentStore {
            fn latest(&self) -> Result<Option<SingletonRow<$value>>, RepositoryError> {
                self.$field.latest()
            }

            fn insert(&self, value: $value) -> Result<SingletonRow<$value>, RepositoryError> {
                self.$field.insert(value)
            }

            fn update(
                &self,
                id: &str,
                value: $value,
            ) -> Result<SingletonRow<$value>, RepositoryError> {
                self.$field.update(id, value)
            }

            fn upsert<F>(
                &self,
                seed: $value,
                apply: F,
            ) -> Result<SingletonRow<$value>, RepositoryError>
            where
                F: FnOnce($value) -> $value,
            {
                self.$field.upsert(seed, apply)
            }

            fn feed(&self) -> &ChangeFeed<SingletonRow<$value>> {
                &self.$field.feed
            }
        }
    };
}

singleton_store!(FeeSchedule, fees);
singleton_store!(EnrollmentSettings, settings);
singleton_store!(FormCopy, form_copy);
singleton_store!(LandingPage, landing);

impl EnrollmentRepository for MemoryEnrollmentStore {
    fn insert_record(&self, applicant: Applicant) -> Result<EnrollmentRecord, RepositoryError> {
        let mut records = lock(&self.records)?;
        let sequence = self.record_sequence.fetch_add(1, Ordering::Relaxed);
        let record = EnrollmentRecord {
            id: RecordId(format!("reg-{sequence:06}")),
            applicant,
            created_at: Utc::now(),
        };
        records.push(record.clone());
        self.record_feed.publish(ChangeEvent::Insert(record.clone()));
        Ok(record)
    }

    fn fetch_record(&self, id: &RecordId) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        let records = lock(&self.records)?;
        Ok(records.iter().find(|record| &record.id == id).cloned())
    }

    fn list_records(&self) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let records = lock(&self.records)?;
        let mut listed = records.clone();
        // Insertion order breaks ties between equal timestamps.
        listed.reverse();
        listed.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(listed)
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records)?;
        let referenced = lock(&self.notification_logs)?
            .iter()
            .any(|log| &log.record_id == id);
        if referenced {
            return Err(RepositoryError::ForeignKey {
                table: "email_notifications",
            });
        }

        let position = records
            .iter()
            .position(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        records.remove(position);
        self.record_feed
            .publish(ChangeEvent::Delete { id: id.0.clone() });
        Ok(())
    }

    fn record_feed(&self) -> &ChangeFeed<EnrollmentRecord> {
        &self.record_feed
    }

    fn append_notification_log(&self, log: NotificationLog) -> Result<(), RepositoryError> {
        let records = lock(&self.records)?;
        if !records.iter().any(|record| record.id == log.record_id) {
            return Err(RepositoryError::ForeignKey {
                table: "pendaftaran",
            });
        }
        lock(&self.notification_logs)?.push(log);
        Ok(())
    }

    fn notification_logs(&self, id: &RecordId) -> Result<Vec<NotificationLog>, RepositoryError> {
        let logs = lock(&self.notification_logs)?;
        Ok(logs.iter().filter(|log| &log.record_id == id).cloned().collect())
    }

    fn delete_notification_logs(&self, id: &RecordId) -> Result<usize, RepositoryError> {
        let mut logs = lock(&self.notification_logs)?;
        let before = logs.len();
        logs.retain(|log| &log.record_id != id);
        Ok(before - logs.len())
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::enrollment::domain::{
    Applicant, EnrollmentRecord, EnrollmentSettings, EnrollmentSubmission, FeeSchedule, FormCopy,
    LandingPage, NotificationLog, RawAge, RecordId, SingletonRow,
};
use crate::enrollment::memory::MemoryEnrollmentStore;
use crate::enrollment::notify::{EmailMessage, NotificationDispatcher, NotifyError};
use crate::enrollment::prompt::Confirmer;
use crate::enrollment::repository::{EnrollmentRepository, SingletonStore};
use crate::enrollment::service::{EnrollmentService, SettingsInput};
use crate::enrollment::storage::{MemoryDocumentStorage, Upload};
use crate::feed::ChangeFeed;
use crate::store::RepositoryError;
use crate::users::{CreateUserRequest, MemoryUserRepository, RoleGate, UserService};

pub(super) const ADMIN_EMAIL: &str = "admin@amalianur.id";
pub(super) const NOTIFY_EMAIL: &str = "tu@amalianur.id";

pub(super) fn submission() -> EnrollmentSubmission {
    EnrollmentSubmission {
        applicant_name: "Amir Hakim".to_string(),
        sex: "Laki-laki".to_string(),
        age: Some(RawAge::Number(5)),
        guardian_phone: "0811".to_string(),
        guardian_email: None,
        address: "Jl. Pendidikan No. 1, Medan".to_string(),
        tier: "TK".to_string(),
        mother_name: "Aisyah".to_string(),
        father_name: "Budi".to_string(),
        parent_phone: "0812".to_string(),
        document_url: Some("memory://pendaftaran/kk.png".to_string()),
        acknowledge_missing_document: false,
    }
}

pub(super) fn submission_without_document() -> EnrollmentSubmission {
    EnrollmentSubmission {
        document_url: None,
        ..submission()
    }
}

pub(super) fn upload(content_type: &str, size: usize) -> Upload {
    Upload {
        file_name: "kartu-keluarga".to_string(),
        content_type: content_type.to_string(),
        bytes: vec![0x25; size],
    }
}

#[derive(Default)]
pub(super) struct RecordingDispatcher {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub(super) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(super) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(message.clone());
        if self.fail {
            return Err(NotifyError::Transport("smtp down".to_string()));
        }
        Ok(())
    }
}

pub(super) struct Harness<R> {
    pub(super) service: Arc<EnrollmentService<R>>,
    pub(super) store: Arc<R>,
    pub(super) dispatcher: Arc<RecordingDispatcher>,
    pub(super) storage: Arc<MemoryDocumentStorage>,
}

pub(super) fn harness_with<R>(store: R, dispatcher: RecordingDispatcher) -> Harness<R>
where
    R: EnrollmentRepository + 'static,
{
    let store = Arc::new(store);
    let dispatcher = Arc::new(dispatcher);
    let storage = Arc::new(MemoryDocumentStorage::default());
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        dispatcher.clone(),
        storage.clone(),
    ));
    Harness {
        service,
        store,
        dispatcher,
        storage,
    }
}

/// Memory store with a notification address configured.
pub(super) fn harness() -> Harness<MemoryEnrollmentStore> {
    let harness = harness_with(MemoryEnrollmentStore::new(), RecordingDispatcher::default());
    harness
        .service
        .save::<EnrollmentSettings, _>(SettingsInput {
            is_open: Some(true),
            notify_email: Some(NOTIFY_EMAIL.to_string()),
        })
        .expect("settings seeded");
    harness
}

pub(super) fn gate() -> RoleGate {
    let users = UserService::new(Arc::new(MemoryUserRepository::default()));
    users
        .create_user(
            CreateUserRequest {
                email: ADMIN_EMAIL.to_string(),
                ..CreateUserRequest::default()
            },
            "system",
        )
        .expect("admin seeded");
    RoleGate::new(users)
}

/// Answers yes/no prompts from a queue (defaulting to "no") and records every question.
#[derive(Default)]
pub(super) struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    text: Option<String>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub(super) fn answering(answers: &[bool], text: Option<&str>) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            text: text.map(str::to_string),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn asked(&self) -> Vec<String> {
        self.asked.lock().expect("confirmer mutex poisoned").clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, message: &str) -> bool {
        self.asked
            .lock()
            .expect("confirmer mutex poisoned")
            .push(message.to_string());
        self.answers
            .lock()
            .expect("confirmer mutex poisoned")
            .pop_front()
            .unwrap_or(false)
    }

    fn prompt(&self, message: &str) -> Option<String> {
        self.asked
            .lock()
            .expect("confirmer mutex poisoned")
            .push(message.to_string());
        self.text.clone()
    }
}

macro_rules! delegate_singletons {
    ($store:ty, $($value:ty),*) => {
        $(impl SingletonStore<$value> for $store {
            fn latest(&self) -> Result<Option<SingletonRow<$value>>, RepositoryError> {
                SingletonStore::<$value>::latest(&self.inner)
            }

            fn insert(&self, value: $value) -> Result<SingletonRow<$value>, RepositoryError> {
                SingletonStore::<$value>::insert(&self.inner, value)
            }

            fn update(
                &self,
                id: &str,
                value: $value,
            ) -> Result<SingletonRow<$value>, RepositoryError> {
                SingletonStore::<$value>::update(&self.inner, id, value)
            }

            fn upsert<F>(
                &self,
                seed: $value,
                apply: F,
            ) -> Result<SingletonRow<$value>, RepositoryError>
            where
                F: FnOnce($value) -> $value,
            {
                SingletonStore::<$value>::upsert(&self.inner, seed, apply)
            }

            fn feed(&self) -> &ChangeFeed<SingletonRow<$value>> {
                SingletonStore::<$value>::feed(&self.inner)
            }
        })*
    };
}

/// Delegates to a memory store but refuses every settings write.
#[derive(Default)]
pub(super) struct ReadOnlySettingsStore {
    pub(super) inner: MemoryEnrollmentStore,
}

impl SingletonStore<EnrollmentSettings> for ReadOnlySettingsStore {
    fn latest(&self) -> Result<Option<SingletonRow<EnrollmentSettings>>, RepositoryError> {
        SingletonStore::<EnrollmentSettings>::latest(&self.inner)
    }

    fn insert(
        &self,
        _value: EnrollmentSettings,
    ) -> Result<SingletonRow<EnrollmentSettings>, RepositoryError> {
        Err(RepositoryError::Unavailable("permission denied".to_string()))
    }

    fn update(
        &self,
        _id: &str,
        _value: EnrollmentSettings,
    ) -> Result<SingletonRow<EnrollmentSettings>, RepositoryError> {
        Err(RepositoryError::Unavailable("permission denied".to_string()))
    }

    fn upsert<F>(
        &self,
        _seed: EnrollmentSettings,
        _apply: F,
    ) -> Result<SingletonRow<EnrollmentSettings>, RepositoryError>
    where
        F: FnOnce(EnrollmentSettings) -> EnrollmentSettings,
    {
        Err(RepositoryError::Unavailable("permission denied".to_string()))
    }

    fn feed(&self) -> &ChangeFeed<SingletonRow<EnrollmentSettings>> {
        SingletonStore::<EnrollmentSettings>::feed(&self.inner)
    }
}

delegate_singletons!(ReadOnlySettingsStore, FeeSchedule, FormCopy, LandingPage);

impl EnrollmentRepository for ReadOnlySettingsStore {
    fn insert_record(&self, applicant: Applicant) -> Result<EnrollmentRecord, RepositoryError> {
        self.inner.insert_record(applicant)
    }

    fn fetch_record(&self, id: &RecordId) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        self.inner.fetch_record(id)
    }

    fn list_records(&self) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        self.inner.list_records()
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), RepositoryError> {
        self.inner.delete_record(id)
    }

    fn record_feed(&self) -> &ChangeFeed<EnrollmentRecord> {
        self.inner.record_feed()
    }

    fn append_notification_log(&self, log: NotificationLog) -> Result<(), RepositoryError> {
        self.inner.append_notification_log(log)
    }

    fn notification_logs(&self, id: &RecordId) -> Result<Vec<NotificationLog>, RepositoryError> {
        self.inner.notification_logs(id)
    }

    fn delete_notification_logs(&self, id: &RecordId) -> Result<usize, RepositoryError> {
        self.inner.delete_notification_logs(id)
    }
}

/// Memory store whose dependent-row cleanup fails, so the retry never succeeds.
#[derive(Default)]
pub(super) struct StickyLogStore {
    pub(super) inner: MemoryEnrollmentStore,
}

delegate_singletons!(StickyLogStore, FeeSchedule, EnrollmentSettings, FormCopy, LandingPage);

impl EnrollmentRepository for StickyLogStore {
    fn insert_record(&self, applicant: Applicant) -> Result<EnrollmentRecord, RepositoryError> {
        self.inner.insert_record(applicant)
    }

    fn fetch_record(&self, id: &RecordId) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        self.inner.fetch_record(id)
    }

    fn list_records(&self) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        self.inner.list_records()
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), RepositoryError> {
        self.inner.delete_record(id)
    }

    fn record_feed(&self) -> &ChangeFeed<EnrollmentRecord> {
        self.inner.record_feed()
    }

    fn append_notification_log(&self, log: NotificationLog) -> Result<(), RepositoryError> {
        self.inner.append_notification_log(log)
    }

    fn notification_logs(&self, id: &RecordId) -> Result<Vec<NotificationLog>, RepositoryError> {
        self.inner.notification_logs(id)
    }

    /// Pretends to succeed without removing anything.
    fn delete_notification_logs(&self, _id: &RecordId) -> Result<usize, RepositoryError> {
        Ok(0)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::store::RepositoryError;

use super::domain::{
    Current, EnrollmentRecord, EnrollmentSettings, EnrollmentSubmission, FeeSchedule, FormCopy,
    LandingPage, NotificationLog, NotificationStatus, RecordId, SingletonRow, Tier,
};
use super::fees::FeeQuote;
use super::notify::{enrollment_alert, EmailMessage, NotificationDispatcher, NotifyError};
use super::repository::{EnrollmentRepository, SingletonStore};
use super::storage::{
    Bucket, DocumentStorage, DocumentUploader, StoredObject, Upload, UploadError, UploadPolicy,
};
use super::validation::{EnrollmentGuard, ValidationError};

pub const MISSING_DOCUMENT_PROMPT: &str =
    "Anda belum mengupload dokumen Kartu Keluarga. Lanjutkan pendaftaran tanpa dokumen?";
pub const DELETE_ALL_PHRASE: &str = "HAPUS SEMUA";

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Pendaftaran sedang ditutup")]
    Closed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("Konfirmasi tidak sesuai. Ketik \"HAPUS SEMUA\" untuk menghapus semua data.")]
    ConfirmationRequired,
    #[error("Tidak ada data untuk dihapus.")]
    NothingToDelete,
}

/// Partial update applied on top of the current singleton value.
pub trait Patch<T> {
    fn apply(self, current: T) -> T;
}

macro_rules! replaces_itself {
    ($($value:ty),*) => {
        $(impl Patch<$value> for $value {
            fn apply(self, _current: $value) -> $value {
                self
            }
        })*
    };
}

replaces_itself!(FeeSchedule, EnrollmentSettings, FormCopy, LandingPage);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeScheduleInput {
    pub tier_kb: Option<u64>,
    pub tier_tk: Option<u64>,
    pub tier_mts: Option<u64>,
    pub active: Option<bool>,
}

impl Patch<FeeSchedule> for FeeScheduleInput {
    fn apply(self, current: FeeSchedule) -> FeeSchedule {
        FeeSchedule {
            tier_kb: self.tier_kb.unwrap_or(current.tier_kb),
            tier_tk: self.tier_tk.unwrap_or(current.tier_tk),
            tier_mts: self.tier_mts.unwrap_or(current.tier_mts),
            active: self.active.unwrap_or(current.active),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsInput {
    pub is_open: Option<bool>,
    pub notify_email: Option<String>,
}

impl Patch<EnrollmentSettings> for SettingsInput {
    fn apply(self, current: EnrollmentSettings) -> EnrollmentSettings {
        EnrollmentSettings {
            is_open: self.is_open.unwrap_or(current.is_open),
            notify_email: self
                .notify_email
                .map(|email| email.trim().to_string())
                .unwrap_or(current.notify_email),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormCopyInput {
    pub header_title: Option<String>,
    pub header_subtitle: Option<String>,
    pub form_title: Option<String>,
    pub form_description: Option<String>,
    pub success_title: Option<String>,
    pub success_message: Option<String>,
}

impl Patch<FormCopy> for FormCopyInput {
    fn apply(self, current: FormCopy) -> FormCopy {
        FormCopy {
            header_title: self.header_title.unwrap_or(current.header_title),
            header_subtitle: self.header_subtitle.unwrap_or(current.header_subtitle),
            form_title: self.form_title.unwrap_or(current.form_title),
            form_description: self.form_description.unwrap_or(current.form_description),
            success_title: self.success_title.unwrap_or(current.success_title),
            success_message: self.success_message.unwrap_or(current.success_message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingPageInput {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

impl Patch<LandingPage> for LandingPageInput {
    fn apply(self, current: LandingPage) -> LandingPage {
        LandingPage {
            title: self.title.unwrap_or(current.title),
            subtitle: self.subtitle.unwrap_or(current.subtitle),
            description: self.description.unwrap_or(current.description),
            contact_person: self.contact_person.unwrap_or(current.contact_person),
            email: self.email.unwrap_or(current.email),
            location: self.location.unwrap_or(current.location),
            image_url: self.image_url.unwrap_or(current.image_url),
        }
    }
}

/// Everything the public form needs to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub settings: EnrollmentSettings,
    pub fees: FeeSchedule,
    pub copy: FormCopy,
}

/// Handle on the admin alert dispatched after a record is committed.
#[derive(Debug)]
pub struct NotificationTask(NotificationState);

#[derive(Debug)]
enum NotificationState {
    Dispatched(JoinHandle<Result<(), NotifyError>>),
    Skipped(NotifyError),
}

impl NotificationTask {
    /// Wait for delivery. Dropping the task instead lets it finish in the background.
    pub async fn wait(self) -> Result<(), NotifyError> {
        match self.0 {
            NotificationState::Dispatched(handle) => handle
                .await
                .unwrap_or_else(|error| Err(NotifyError::Transport(error.to_string()))),
            NotificationState::Skipped(error) => Err(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub record: EnrollmentRecord,
    pub success_title: String,
    pub success_message: String,
    #[serde(skip)]
    pub notification: NotificationTask,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// No document attached and the applicant has not yet agreed to continue.
    NeedsConfirmation { prompt: &'static str },
    Accepted(SubmissionReceipt),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub id: RecordId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub deleted: Vec<RecordId>,
    pub failed: Vec<DeleteFailure>,
}

/// Service composing validation, storage, uploads, and notifications.
pub struct EnrollmentService<R> {
    guard: EnrollmentGuard,
    repository: Arc<R>,
    notifier: Arc<dyn NotificationDispatcher>,
    documents: DocumentUploader,
    landing_images: DocumentUploader,
}

impl<R> EnrollmentService<R>
where
    R: EnrollmentRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<dyn NotificationDispatcher>,
        storage: Arc<dyn DocumentStorage>,
    ) -> Self {
        let documents =
            DocumentUploader::new(storage.clone(), UploadPolicy::documents(), Bucket::Enrollment);
        Self {
            guard: EnrollmentGuard::issued_under(documents.public_prefix()),
            repository,
            notifier,
            documents,
            landing_images: DocumentUploader::new(storage, UploadPolicy::images(), Bucket::Landing),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Current value of a singleton, or its defaults when the table is still empty.
    pub fn load<T>(&self) -> Result<Current<T>, EnrollmentError>
    where
        R: SingletonStore<T>,
        T: Clone + Default + Send + Sync + 'static,
    {
        let row = SingletonStore::<T>::latest(self.repository.as_ref())?;
        Ok(Current::from_row(row))
    }

    /// Get-or-create write: patches the stored row, or the defaults when the
    /// table is still empty.
    pub fn save<T, P>(&self, patch: P) -> Result<SingletonRow<T>, EnrollmentError>
    where
        R: SingletonStore<T>,
        T: Clone + Default + Send + Sync + 'static,
        P: Patch<T>,
    {
        let store: &R = self.repository.as_ref();
        let row = SingletonStore::<T>::upsert(store, T::default(), |current| patch.apply(current))?;
        info!(table = SingletonStore::<T>::feed(store).table(), id = %row.id, "singleton saved");
        Ok(row)
    }

    pub fn snapshot(&self) -> Result<FormSnapshot, EnrollmentError> {
        Ok(FormSnapshot {
            settings: self.load::<EnrollmentSettings>()?.value,
            fees: self.load::<FeeSchedule>()?.value,
            copy: self.load::<FormCopy>()?.value,
        })
    }

    pub fn fee_quote(&self, tier: Option<&str>) -> Result<FeeQuote, EnrollmentError> {
        let fees = self.load::<FeeSchedule>()?.value;
        Ok(fees.quote(tier.and_then(Tier::parse)))
    }

    pub fn set_open(&self, is_open: bool) -> Result<SingletonRow<EnrollmentSettings>, EnrollmentError> {
        let row = self.save(SettingsInput {
            is_open: Some(is_open),
            notify_email: None,
        })?;
        info!(is_open, "enrollment gate changed");
        Ok(row)
    }

    pub fn toggle_open(&self) -> Result<SingletonRow<EnrollmentSettings>, EnrollmentError> {
        let current = self.load::<EnrollmentSettings>()?;
        self.set_open(!current.value.is_open)
    }

    /// Validate and store a submission, then queue the admin alert.
    pub async fn submit(
        &self,
        submission: EnrollmentSubmission,
    ) -> Result<SubmitOutcome, EnrollmentError> {
        let snapshot = self.snapshot()?;
        if !snapshot.settings.is_open {
            return Err(EnrollmentError::Closed);
        }

        let applicant = self
            .guard
            .applicant_from_submission(&submission, &snapshot.fees)?;
        if applicant.document_url.is_none() && !submission.acknowledge_missing_document {
            return Ok(SubmitOutcome::NeedsConfirmation {
                prompt: MISSING_DOCUMENT_PROMPT,
            });
        }

        let record = self.repository.insert_record(applicant)?;
        info!(
            id = %record.id,
            tier = record.applicant.tier.code(),
            fee = record.applicant.computed_fee,
            "enrollment recorded"
        );

        let notification = self.dispatch_alert(&record, &snapshot.settings.notify_email);
        let success_message = snapshot.copy.render_success(
            &record.applicant.name,
            &record.applicant.guardian_phone,
            record.applicant.guardian_email.as_deref(),
        );

        Ok(SubmitOutcome::Accepted(SubmissionReceipt {
            success_title: snapshot.copy.success_title,
            success_message,
            record,
            notification,
        }))
    }

    fn dispatch_alert(&self, record: &EnrollmentRecord, to: &str) -> NotificationTask {
        if to.trim().is_empty() {
            warn!(id = %record.id, "no notification address configured; alert skipped");
            return NotificationTask(NotificationState::Skipped(NotifyError::MissingRecipient));
        }

        let message = enrollment_alert(record, to.trim());
        let record_id = record.id.clone();
        let notifier = self.notifier.clone();
        let repository = self.repository.clone();
        let handle = tokio::spawn(async move {
            deliver_and_log(notifier.as_ref(), repository.as_ref(), &record_id, &message).await
        });
        NotificationTask(NotificationState::Dispatched(handle))
    }

    /// Resend the admin alert for a stored record. Failures are returned, not swallowed.
    pub async fn notify_admin(&self, id: &RecordId) -> Result<(), EnrollmentError> {
        let record = self
            .repository
            .fetch_record(id)?
            .ok_or(RepositoryError::NotFound)?;
        let settings = self.load::<EnrollmentSettings>()?.value;
        let to = settings.notify_email.trim();
        if to.is_empty() {
            return Err(NotifyError::MissingRecipient.into());
        }
        let message = enrollment_alert(&record, to);
        deliver_and_log(
            self.notifier.as_ref(),
            self.repository.as_ref(),
            &record.id,
            &message,
        )
        .await?;
        Ok(())
    }

    pub async fn send_email(&self, message: &EmailMessage) -> Result<(), EnrollmentError> {
        message.validate()?;
        self.notifier.send(message).await?;
        Ok(())
    }

    /// Store a family-card scan. Only allowed while enrollment is open.
    pub async fn upload_document(&self, upload: Upload) -> Result<StoredObject, EnrollmentError> {
        if !self.load::<EnrollmentSettings>()?.value.is_open {
            return Err(EnrollmentError::Closed);
        }
        Ok(self.documents.upload(upload).await?)
    }

    /// Store a landing-page image and point the landing copy at it.
    pub async fn upload_landing_image(
        &self,
        upload: Upload,
    ) -> Result<SingletonRow<LandingPage>, EnrollmentError> {
        let stored = self.landing_images.upload(upload).await?;
        self.save(LandingPageInput {
            image_url: Some(stored.public_url),
            ..LandingPageInput::default()
        })
    }

    pub fn list_records(&self) -> Result<Vec<EnrollmentRecord>, EnrollmentError> {
        Ok(self.repository.list_records()?)
    }

    pub fn fetch_record(&self, id: &RecordId) -> Result<EnrollmentRecord, EnrollmentError> {
        Ok(self
            .repository
            .fetch_record(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// Delete one record. A foreign-key failure clears the dependent
    /// notification-log rows and retries exactly once.
    pub fn delete_record(&self, id: &RecordId) -> Result<(), EnrollmentError> {
        match self.repository.delete_record(id) {
            Ok(()) => {}
            Err(RepositoryError::ForeignKey { table }) => {
                let removed = self.repository.delete_notification_logs(id)?;
                info!(%id, table, removed, "cleared dependent rows before retrying delete");
                self.repository.delete_record(id)?;
            }
            Err(error) => return Err(error.into()),
        }
        info!(%id, "enrollment record deleted");
        Ok(())
    }

    /// Delete each id through [`Self::delete_record`], collecting failures.
    pub fn delete_many(&self, ids: &[RecordId]) -> DeleteSummary {
        let mut summary = DeleteSummary::default();
        for id in ids {
            match self.delete_record(id) {
                Ok(()) => summary.deleted.push(id.clone()),
                Err(error) => {
                    warn!(%id, %error, "bulk delete skipped record");
                    summary.failed.push(DeleteFailure {
                        id: id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }
        summary
    }

    /// Bulk delete guarded by the confirmation flag and the exact phrase.
    pub fn delete_all(
        &self,
        confirmed: bool,
        phrase: &str,
    ) -> Result<DeleteSummary, EnrollmentError> {
        if !confirmed || phrase != DELETE_ALL_PHRASE {
            return Err(EnrollmentError::ConfirmationRequired);
        }
        let ids: Vec<RecordId> = self
            .repository
            .list_records()?
            .into_iter()
            .map(|record| record.id)
            .collect();
        if ids.is_empty() {
            return Err(EnrollmentError::NothingToDelete);
        }
        Ok(self.delete_many(&ids))
    }
}

async fn deliver_and_log<R>(
    notifier: &dyn NotificationDispatcher,
    repository: &R,
    record_id: &RecordId,
    message: &EmailMessage,
) -> Result<(), NotifyError>
where
    R: EnrollmentRepository + ?Sized,
{
    let result = notifier.send(message).await;
    let (status, error) = match &result {
        Ok(()) => (NotificationStatus::Sent, None),
        Err(error) => {
            warn!(id = %record_id, %error, "admin notification failed");
            (NotificationStatus::Failed, Some(error.to_string()))
        }
    };

    let log = NotificationLog {
        record_id: record_id.clone(),
        recipient: message.to.joined(),
        subject: message.subject.clone(),
        status,
        error,
        created_at: Utc::now(),
    };
    if let Err(error) = repository.append_notification_log(log) {
        warn!(id = %record_id, %error, "notification log not written");
    }
    result
}

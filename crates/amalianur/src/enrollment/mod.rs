//! Enrollment workflow: the public registration form, fee lookup, document
//! uploads, the admin alert, and the admin console over submitted records.

pub mod console;
pub mod domain;
pub mod export;
pub mod fees;
pub mod form;
pub mod memory;
pub mod notify;
pub mod prompt;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod tests;

pub use console::{AdminConsole, ConsoleOutcome, RecordDetail, RecordListView};
pub use domain::{
    Applicant, Current, EnrollmentRecord, EnrollmentSettings, EnrollmentSubmission, FeeSchedule,
    FormCopy, LandingPage, NotificationLog, NotificationStatus, RawAge, RecordId, Sex,
    SingletonRow, Tier,
};
pub use export::{export_records, ExportError, ExportFile};
pub use fees::{format_rupiah, FeeQuote};
pub use form::{render_form, EnrollmentForm, FormResult, FormView};
pub use memory::MemoryEnrollmentStore;
pub use notify::{
    DisabledDispatcher, EmailMessage, HttpEmailDispatcher, NotificationDispatcher, NotifyError,
    Recipients,
};
pub use prompt::{AssumeYes, Confirmer};
pub use repository::{EnrollmentRepository, SingletonStore};
pub use router::enrollment_router;
pub use service::{
    DeleteSummary, EnrollmentError, EnrollmentService, FormSnapshot, SubmissionReceipt,
    SubmitOutcome, DELETE_ALL_PHRASE, MISSING_DOCUMENT_PROMPT,
};
pub use storage::{
    Bucket, DocumentStorage, LocalDocumentStorage, MemoryDocumentStorage, StoredObject, Upload,
    UploadError,
};
pub use validation::ValidationError;

//! Public enrollment form session.
//!
//! A session subscribes to the settings, fee, and copy feeds before taking its
//! first snapshot, so no admin change between the two is lost. Dropping the
//! session detaches every subscription.

use serde::Serialize;
use tracing::{debug, info};

use crate::feed::{ChangeEvent, Subscription};

use super::domain::{
    EnrollmentSettings, EnrollmentSubmission, FeeSchedule, FormCopy, SingletonRow, Tier,
};
use super::fees::FeeQuote;
use super::prompt::Confirmer;
use super::repository::{EnrollmentRepository, SingletonStore};
use super::service::{
    EnrollmentError, EnrollmentService, FormSnapshot, SubmissionReceipt, SubmitOutcome,
};
use super::storage::{StoredObject, Upload};

pub const CLOSED_CONTACT_PHONE: &str = "0812-3456-7890";
pub const CLOSED_CONTACT_EMAIL: &str = "info@yayasanamalianur.sch.id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedNotice {
    pub title: &'static str,
    pub message: &'static str,
    pub contact_phone: &'static str,
    pub contact_email: &'static str,
}

impl Default for ClosedNotice {
    fn default() -> Self {
        Self {
            title: "Pendaftaran Ditutup",
            message: "Mohon maaf, pendaftaran saat ini sedang ditutup. \
                Silakan hubungi kami untuk informasi lebih lanjut.",
            contact_phone: CLOSED_CONTACT_PHONE,
            contact_email: CLOSED_CONTACT_EMAIL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Tel,
    Select,
    TextArea,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind, required: bool) -> FormField {
    FormField {
        name,
        label,
        kind,
        required,
    }
}

pub fn form_fields() -> Vec<FormField> {
    vec![
        field("applicant_name", "Nama Lengkap", FieldKind::Text, true),
        field("sex", "Jenis Kelamin", FieldKind::Select, true),
        field("age", "Umur", FieldKind::Number, true),
        field("guardian_phone", "No. Telepon", FieldKind::Tel, true),
        field("guardian_email", "Email", FieldKind::Email, false),
        field("address", "Alamat", FieldKind::TextArea, true),
        field("tier", "Jenjang Pendidikan", FieldKind::Select, true),
        field("mother_name", "Nama Ibu", FieldKind::Text, true),
        field("father_name", "Nama Ayah", FieldKind::Text, true),
        field("parent_phone", "No. Telepon Orang Tua", FieldKind::Tel, true),
        field("document", "Upload Kartu Keluarga", FieldKind::File, false),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierOption {
    pub code: &'static str,
    pub label: &'static str,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenForm {
    pub copy: FormCopy,
    pub fields: Vec<FormField>,
    pub tiers: Vec<TierOption>,
    pub fee: FeeQuote,
}

/// What the form page shows for a given snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FormView {
    Closed(ClosedNotice),
    Open(OpenForm),
}

impl FormView {
    pub fn fields(&self) -> &[FormField] {
        match self {
            FormView::Closed(_) => &[],
            FormView::Open(form) => &form.fields,
        }
    }
}

pub fn render_form(snapshot: &FormSnapshot, tier: Option<Tier>) -> FormView {
    if !snapshot.settings.is_open {
        return FormView::Closed(ClosedNotice::default());
    }

    FormView::Open(OpenForm {
        copy: snapshot.copy.clone(),
        fields: form_fields(),
        tiers: Tier::ordered()
            .into_iter()
            .map(|tier| TierOption {
                code: tier.code(),
                label: tier.label(),
                fee: snapshot.fees.fee_for(Some(tier)),
            })
            .collect(),
        fee: snapshot.fees.quote(tier),
    })
}

#[derive(Debug)]
pub enum FormResult {
    Submitted(SubmissionReceipt),
    /// The applicant declined to continue without a document. Nothing was stored.
    Cancelled,
}

/// One applicant's view of the form, kept current by the live feeds.
pub struct EnrollmentForm {
    snapshot: FormSnapshot,
    draft: EnrollmentSubmission,
    tier: Option<Tier>,
    fee: u64,
    settings_feed: Subscription<SingletonRow<EnrollmentSettings>>,
    fee_feed: Subscription<SingletonRow<FeeSchedule>>,
    copy_feed: Subscription<SingletonRow<FormCopy>>,
}

impl EnrollmentForm {
    pub fn open<R>(service: &EnrollmentService<R>) -> Result<Self, EnrollmentError>
    where
        R: EnrollmentRepository + 'static,
    {
        let repository = service.repository().as_ref();
        let settings_feed = SingletonStore::<EnrollmentSettings>::subscribe(repository);
        let fee_feed = SingletonStore::<FeeSchedule>::subscribe(repository);
        let copy_feed = SingletonStore::<FormCopy>::subscribe(repository);
        let snapshot = service.snapshot()?;
        debug!(is_open = snapshot.settings.is_open, "form session opened");

        Ok(Self {
            snapshot,
            draft: EnrollmentSubmission::default(),
            tier: None,
            fee: 0,
            settings_feed,
            fee_feed,
            copy_feed,
        })
    }

    /// Apply pending feed events. Returns how many were applied.
    pub fn refresh(&mut self) -> usize {
        let mut applied = 0;
        for event in self.settings_feed.drain() {
            if let ChangeEvent::Insert(row) | ChangeEvent::Update(row) = event {
                self.snapshot.settings = row.value;
                applied += 1;
            }
        }
        for event in self.fee_feed.drain() {
            if let ChangeEvent::Insert(row) | ChangeEvent::Update(row) = event {
                self.snapshot.fees = row.value;
                applied += 1;
            }
        }
        for event in self.copy_feed.drain() {
            if let ChangeEvent::Insert(row) | ChangeEvent::Update(row) = event {
                self.snapshot.copy = row.value;
                applied += 1;
            }
        }
        if applied > 0 {
            self.fee = self.snapshot.fees.fee_for(self.tier);
        }
        applied
    }

    pub fn snapshot(&self) -> &FormSnapshot {
        &self.snapshot
    }

    pub fn is_open(&self) -> bool {
        self.snapshot.settings.is_open
    }

    pub fn view(&self) -> FormView {
        render_form(&self.snapshot, self.tier)
    }

    /// Select a tier by code. Anything unrecognised clears the selection and the fee.
    pub fn set_tier(&mut self, raw: &str) -> u64 {
        self.tier = Tier::parse(raw);
        self.draft.tier = raw.to_string();
        self.fee = self.snapshot.fees.fee_for(self.tier);
        self.fee
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn draft_mut(&mut self) -> &mut EnrollmentSubmission {
        &mut self.draft
    }

    pub async fn attach_document<R>(
        &mut self,
        service: &EnrollmentService<R>,
        upload: Upload,
    ) -> Result<StoredObject, EnrollmentError>
    where
        R: EnrollmentRepository + 'static,
    {
        let stored = service.upload_document(upload).await?;
        self.draft.document_url = Some(stored.public_url.clone());
        Ok(stored)
    }

    /// Submit the draft, asking `confirmer` before sending without a document.
    pub async fn submit<R>(
        &mut self,
        service: &EnrollmentService<R>,
        confirmer: &dyn Confirmer,
    ) -> Result<FormResult, EnrollmentError>
    where
        R: EnrollmentRepository + 'static,
    {
        self.refresh();
        if !self.is_open() {
            return Err(EnrollmentError::Closed);
        }

        match service.submit(self.draft.clone()).await? {
            SubmitOutcome::Accepted(receipt) => {
                self.reset();
                Ok(FormResult::Submitted(receipt))
            }
            SubmitOutcome::NeedsConfirmation { prompt } => {
                if !confirmer.confirm(prompt) {
                    info!("submission cancelled without document");
                    return Ok(FormResult::Cancelled);
                }
                let mut acknowledged = self.draft.clone();
                acknowledged.acknowledge_missing_document = true;
                match service.submit(acknowledged).await? {
                    SubmitOutcome::Accepted(receipt) => {
                        self.reset();
                        Ok(FormResult::Submitted(receipt))
                    }
                    SubmitOutcome::NeedsConfirmation { .. } => Ok(FormResult::Cancelled),
                }
            }
        }
    }

    fn reset(&mut self) {
        self.draft = EnrollmentSubmission::default();
        self.tier = None;
        self.fee = 0;
    }
}

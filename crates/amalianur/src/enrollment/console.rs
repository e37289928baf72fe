//! Admin enrollment console: a live record list plus the destructive actions
//! that sit on top of it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::feed::{ChangeEvent, Subscription};

use super::domain::{EnrollmentRecord, EnrollmentSettings, LandingPage, RecordId, SingletonRow};
use super::export::{export_records, local_date, ExportError, ExportFile};
use super::fees::format_rupiah;
use super::notify::escape_html;
use super::prompt::Confirmer;
use super::repository::{EnrollmentRepository, SingletonStore};
use super::service::{EnrollmentError, EnrollmentService, DELETE_ALL_PHRASE};

pub const TOAST_SECONDS: i64 = 4;
pub const FOUNDATION_NAME: &str = "YAYASAN AMALIANUR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Newest-first list of records kept in step with the record feed.
#[derive(Debug, Clone, Default)]
pub struct RecordListView {
    records: Vec<EnrollmentRecord>,
    toast: Option<Toast>,
}

impl RecordListView {
    pub fn new(records: Vec<EnrollmentRecord>) -> Self {
        Self {
            records,
            toast: None,
        }
    }

    pub fn apply(&mut self, event: ChangeEvent<EnrollmentRecord>, now: DateTime<Utc>) {
        match event {
            ChangeEvent::Insert(record) => {
                self.toast = Some(Toast {
                    message: format!("Pendaftar baru: {}", record.applicant.name),
                    expires_at: now + Duration::seconds(TOAST_SECONDS),
                });
                self.records.retain(|existing| existing.id != record.id);
                self.records.insert(0, record);
            }
            ChangeEvent::Update(record) => {
                if let Some(existing) = self
                    .records
                    .iter_mut()
                    .find(|existing| existing.id == record.id)
                {
                    *existing = record;
                }
            }
            ChangeEvent::Delete { id } => {
                self.records.retain(|record| record.id.0 != id);
            }
        }
    }

    pub fn records(&self) -> &[EnrollmentRecord] {
        &self.records
    }

    /// The toast, if it has not yet expired at `now`.
    pub fn toast(&self, now: DateTime<Utc>) -> Option<&Toast> {
        self.toast.as_ref().filter(|toast| now < toast.expires_at)
    }

    /// Case-insensitive match on name, phone, parent names, or tier code.
    pub fn search(&self, query: &str) -> Vec<&EnrollmentRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.records.iter().collect();
        }
        self.records
            .iter()
            .filter(|record| {
                let applicant = &record.applicant;
                [
                    applicant.name.as_str(),
                    applicant.guardian_phone.as_str(),
                    applicant.mother_name.as_str(),
                    applicant.father_name.as_str(),
                    applicant.tier.code(),
                ]
                .iter()
                .any(|value| value.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

/// Result of an interactive console action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// The admin backed out at a prompt.
    Cancelled,
    /// Preconditions were not met; nothing was attempted.
    Refused(String),
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Letterhead {
    pub name: &'static str,
    pub address: String,
    pub phone: String,
}

impl From<&LandingPage> for Letterhead {
    fn from(landing: &LandingPage) -> Self {
        Self {
            name: FOUNDATION_NAME,
            address: landing.location.clone(),
            phone: landing.contact_person.clone(),
        }
    }
}

/// One record prepared for the detail panel and the print dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDetail {
    pub letterhead: Letterhead,
    pub record: EnrollmentRecord,
}

impl RecordDetail {
    /// Image documents can be zoomed; PDFs cannot.
    pub fn fullscreen_url(&self) -> Option<&str> {
        let url = self.record.applicant.document_url.as_deref()?;
        let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
        mime_guess::from_path(path)
            .first()
            .filter(|mime| mime.type_() == mime::IMAGE)
            .map(|_| url)
    }

    /// Printable fragment: letterhead followed by every field.
    pub fn print_html(&self) -> String {
        let applicant = &self.record.applicant;
        let rows = [
            ("Nama", applicant.name.clone()),
            ("Jenis Kelamin", applicant.sex.label().to_string()),
            ("Jenjang", applicant.tier.code().to_string()),
            ("Umur", applicant.age.to_string()),
            ("Telepon", applicant.guardian_phone.clone()),
            (
                "Email",
                applicant
                    .guardian_email
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Alamat", applicant.address.clone()),
            ("Nama Ibu", applicant.mother_name.clone()),
            ("Nama Ayah", applicant.father_name.clone()),
            ("Telepon Ortu", applicant.parent_phone.clone()),
            ("Total Biaya", format_rupiah(applicant.computed_fee)),
            ("Tanggal Daftar", local_date(self.record.created_at)),
        ];

        let mut html = String::from("<div id=\"print-area\">");
        html.push_str(&format!(
            "<header><h3>{}</h3><p>{} | Telp. {}</p></header>",
            self.letterhead.name,
            escape_html(&self.letterhead.address),
            escape_html(&self.letterhead.phone),
        ));
        html.push_str("<h2>Formulir Pendaftaran</h2><dl>");
        for (label, value) in rows {
            html.push_str(&format!("<dt>{label}</dt><dd>{}</dd>", escape_html(&value)));
        }
        html.push_str("</dl>");
        match applicant.document_url.as_deref() {
            Some(url) if !linkable(url) => {
                html.push_str("<p><em>Tautan dokumen tidak dapat ditampilkan</em></p>")
            }
            Some(url) if self.fullscreen_url().is_some() => html.push_str(&format!(
                "<figure><img src=\"{}\" alt=\"Foto KK\" /></figure>",
                escape_html(url)
            )),
            Some(url) => html.push_str(&format!(
                "<p><a href=\"{}\">Dokumen Kartu Keluarga</a></p>",
                escape_html(url)
            )),
            None => html.push_str("<p><em>Belum ada foto KK</em></p>"),
        }
        html.push_str("</div>");
        html
    }
}

fn linkable(url: &str) -> bool {
    ["https://", "http://", "memory://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// One admin's session over the enrollment tables.
pub struct AdminConsole<R> {
    service: Arc<EnrollmentService<R>>,
    view: RecordListView,
    is_open: bool,
    record_feed: Subscription<EnrollmentRecord>,
    settings_feed: Subscription<SingletonRow<EnrollmentSettings>>,
}

impl<R> AdminConsole<R>
where
    R: EnrollmentRepository + 'static,
{
    /// Subscribe first, then read, so nothing committed in between is missed.
    pub fn open(service: Arc<EnrollmentService<R>>) -> Result<Self, EnrollmentError> {
        let repository = service.repository().as_ref();
        let record_feed = repository.record_feed().subscribe();
        let settings_feed = SingletonStore::<EnrollmentSettings>::subscribe(repository);
        let records = service.list_records()?;
        let is_open = service.load::<EnrollmentSettings>()?.value.is_open;

        Ok(Self {
            view: RecordListView::new(records),
            is_open,
            record_feed,
            settings_feed,
            service,
        })
    }

    pub fn view(&self) -> &RecordListView {
        &self.view
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Apply pending feed events at `now`.
    pub fn sync(&mut self, now: DateTime<Utc>) -> usize {
        let mut applied = 0;
        for event in self.record_feed.drain() {
            self.view.apply(event, now);
            applied += 1;
        }
        for event in self.settings_feed.drain() {
            if let ChangeEvent::Insert(row) | ChangeEvent::Update(row) = event {
                self.is_open = row.value.is_open;
                applied += 1;
            }
        }
        applied
    }

    pub fn delete_one(&mut self, id: &RecordId, confirmer: &dyn Confirmer) -> ConsoleOutcome {
        let name = self
            .view
            .records()
            .iter()
            .find(|record| &record.id == id)
            .map(|record| record.applicant.name.clone())
            .unwrap_or_else(|| id.0.clone());

        if !confirmer.confirm(&format!("Yakin ingin menghapus data {name}?")) {
            return ConsoleOutcome::Cancelled;
        }

        let outcome = match self.service.delete_record(id) {
            Ok(()) => ConsoleOutcome::Succeeded(format!("Data {name} berhasil dihapus.")),
            Err(error) => {
                warn!(%id, %error, "console delete failed");
                ConsoleOutcome::Failed(format!("Gagal menghapus data: {error}"))
            }
        };
        self.sync(Utc::now());
        outcome
    }

    /// Two prompts: a yes/no, then the exact confirmation phrase.
    pub fn delete_all(&mut self, confirmer: &dyn Confirmer) -> ConsoleOutcome {
        let count = self.view.records().len();
        if count == 0 {
            return ConsoleOutcome::Refused("Tidak ada data untuk dihapus.".to_string());
        }

        if !confirmer.confirm(&format!(
            "Yakin ingin menghapus SEMUA {count} data pendaftar? Tindakan ini tidak dapat dibatalkan."
        )) {
            return ConsoleOutcome::Cancelled;
        }

        let Some(phrase) = confirmer.prompt(&format!(
            "Ketik \"{DELETE_ALL_PHRASE}\" untuk mengonfirmasi penghapusan."
        )) else {
            return ConsoleOutcome::Cancelled;
        };
        if phrase != DELETE_ALL_PHRASE {
            return ConsoleOutcome::Refused("Konfirmasi tidak sesuai. Penghapusan dibatalkan.".to_string());
        }

        let ids: Vec<RecordId> = self
            .view
            .records()
            .iter()
            .map(|record| record.id.clone())
            .collect();
        let summary = self.service.delete_many(&ids);
        self.sync(Utc::now());
        info!(
            deleted = summary.deleted.len(),
            failed = summary.failed.len(),
            "bulk delete finished"
        );

        if summary.failed.is_empty() {
            ConsoleOutcome::Succeeded(format!(
                "Berhasil menghapus {} data pendaftar.",
                summary.deleted.len()
            ))
        } else {
            ConsoleOutcome::Failed(format!(
                "Berhasil menghapus {} data, gagal menghapus {} data.",
                summary.deleted.len(),
                summary.failed.len()
            ))
        }
    }

    /// Export the records currently shown.
    pub fn export(&self) -> Result<ExportFile, ExportError> {
        export_records(self.view.records())
    }

    /// Flip the gate immediately and revert if the write fails.
    pub fn toggle_open(&mut self) -> ConsoleOutcome {
        let previous = self.is_open;
        self.is_open = !previous;

        match self.service.set_open(self.is_open) {
            Ok(row) => {
                self.is_open = row.value.is_open;
                let state = if self.is_open { "dibuka" } else { "ditutup" };
                ConsoleOutcome::Succeeded(format!("Pendaftaran berhasil {state}."))
            }
            Err(error) => {
                self.is_open = previous;
                warn!(%error, "enrollment toggle reverted");
                ConsoleOutcome::Failed(format!("Gagal mengubah status pendaftaran: {error}"))
            }
        }
    }

    pub fn detail(&self, id: &RecordId) -> Result<RecordDetail, EnrollmentError> {
        let record = self.service.fetch_record(id)?;
        let landing = self.service.load::<LandingPage>()?.value;
        Ok(RecordDetail {
            letterhead: Letterhead::from(&landing),
            record,
        })
    }
}

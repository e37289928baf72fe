use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown in the success message when no e-mail was given.
pub const EMAIL_FALLBACK: &str = "yang telah didaftarkan";

/// Identifier wrapper for stored enrollment records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Program level that determines the enrollment fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "KB")]
    Kb,
    #[serde(rename = "TK")]
    Tk,
    #[serde(rename = "MTS")]
    Mts,
}

impl Tier {
    pub const fn ordered() -> [Self; 3] {
        [Self::Kb, Self::Tk, Self::Mts]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Kb => "KB",
            Self::Tk => "TK",
            Self::Mts => "MTS",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Kb => "Kelompok Bermain (KB)",
            Self::Tk => "Taman Kanak-kanak (TK)",
            Self::Mts => "Madrasah Tsanawiyah (MTs)",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "KB" => Some(Self::Kb),
            "TK" => Some(Self::Tk),
            "MTS" => Some(Self::Mts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Laki-laki")]
    Male,
    #[serde(rename = "Perempuan")]
    Female,
}

impl Sex {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Laki-laki",
            Self::Female => "Perempuan",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "l" | "laki-laki" | "laki laki" | "male" => Some(Self::Male),
            "p" | "perempuan" | "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Price list per tier, amounts in rupiah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub tier_kb: u64,
    pub tier_tk: u64,
    pub tier_mts: u64,
    pub active: bool,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            tier_kb: 500_000,
            tier_tk: 750_000,
            tier_mts: 1_000_000,
            active: true,
        }
    }
}

/// Enrollment gate and the address that receives new-applicant alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSettings {
    pub is_open: bool,
    pub notify_email: String,
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            is_open: true,
            notify_email: String::new(),
        }
    }
}

/// Headings and the success-message template shown by the public form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormCopy {
    pub header_title: String,
    pub header_subtitle: String,
    pub form_title: String,
    pub form_description: String,
    pub success_title: String,
    pub success_message: String,
}

impl Default for FormCopy {
    fn default() -> Self {
        Self {
            header_title: "Formulir Pendaftaran".to_string(),
            header_subtitle: "Isi data dengan lengkap dan benar".to_string(),
            form_title: "Data Calon Siswa/Santri".to_string(),
            form_description: "Lengkapi informasi berikut untuk proses pendaftaran".to_string(),
            success_title: "Pendaftaran Berhasil!".to_string(),
            success_message: "Terima kasih {nama} telah mendaftar di Yayasan Amalianur. \
                Data Anda telah kami terima dan akan segera diproses. Admin kami akan \
                menghubungi Anda dalam 1-2 hari kerja melalui nomor telepon {telepon} \
                atau email {email} untuk informasi lebih lanjut."
                .to_string(),
        }
    }
}

impl FormCopy {
    /// Substitute the submitted values into the success template.
    ///
    /// Both the Indonesian (`{nama}`, `{telepon}`) and English (`{name}`,
    /// `{phone}`) tokens are recognised. A missing or blank e-mail renders as
    /// [`EMAIL_FALLBACK`].
    pub fn render_success(&self, name: &str, phone: &str, email: Option<&str>) -> String {
        let email = email
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(EMAIL_FALLBACK);

        self.success_message
            .replace("{nama}", name)
            .replace("{name}", name)
            .replace("{telepon}", phone)
            .replace("{phone}", phone)
            .replace("{email}", email)
    }
}

/// Copy for the enrollment landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingPage {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub contact_person: String,
    pub email: String,
    pub location: String,
    pub image_url: String,
}

impl Default for LandingPage {
    fn default() -> Self {
        Self {
            title: "Daftar Sekarang di Yayasan Amalianur".to_string(),
            subtitle: "Bergabung bersama kami untuk mencetak generasi Islami dan berakhlak mulia."
                .to_string(),
            description: "Yayasan Amalianur membuka kesempatan bagi calon siswa/santri yang \
                ingin mendapatkan pendidikan Islami, lingkungan positif, dan pembinaan karakter."
                .to_string(),
            contact_person: "081234567890".to_string(),
            email: "info@yayasanamalianur.sch.id".to_string(),
            location: "Jl. Pendidikan No. 123, Medan, Sumatera Utara".to_string(),
            image_url: String::new(),
        }
    }
}

/// A stored singleton row. The value is flattened so clients see one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingletonRow<T> {
    pub id: String,
    #[serde(flatten)]
    pub value: T,
    pub updated_at: DateTime<Utc>,
}

/// Current value of a singleton, falling back to defaults when no row exists yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Current<T> {
    pub id: Option<String>,
    #[serde(flatten)]
    pub value: T,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T: Default> Current<T> {
    pub fn from_row(row: Option<SingletonRow<T>>) -> Self {
        match row {
            Some(row) => Self {
                id: Some(row.id),
                value: row.value,
                updated_at: Some(row.updated_at),
            },
            None => Self {
                id: None,
                value: T::default(),
                updated_at: None,
            },
        }
    }
}

/// Age exactly as the client sent it; the guard decides whether it is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAge {
    Number(i64),
    Text(String),
}

/// Form payload before validation. Missing fields deserialize as blanks so the
/// guard can report them with a user-facing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSubmission {
    #[serde(default)]
    pub applicant_name: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: Option<RawAge>,
    #[serde(default)]
    pub guardian_phone: String,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub mother_name: String,
    #[serde(default)]
    pub father_name: String,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub document_url: Option<String>,
    /// Answer to the "no family-card uploaded" prompt.
    #[serde(default)]
    pub acknowledge_missing_document: bool,
}

/// Validated applicant data, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub sex: Sex,
    pub age: u8,
    pub guardian_phone: String,
    pub guardian_email: Option<String>,
    pub address: String,
    pub tier: Tier,
    pub mother_name: String,
    pub father_name: String,
    pub parent_phone: String,
    pub document_url: Option<String>,
    pub computed_fee: u64,
}

/// Row of the `pendaftaran` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub applicant: Applicant,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

/// Row of the `email_notifications` table; references a record by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub record_id: RecordId,
    pub recipient: String,
    pub subject: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::domain::EnrollmentRecord;

pub const EXPORT_FILE_NAME: &str = "Daftar_Pendaftar.csv";
pub const EXPORT_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const WIB_OFFSET_SECONDS: i32 = 7 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Belum ada data untuk diekspor.")]
    Empty,
    #[error("gagal menulis CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("gagal menyusun berkas ekspor: {0}")]
    Buffer(String),
}

/// Downloadable spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "No")]
    number: usize,
    #[serde(rename = "Nama")]
    name: &'a str,
    #[serde(rename = "Jenis Kelamin")]
    sex: &'a str,
    #[serde(rename = "Jenjang")]
    tier: &'a str,
    #[serde(rename = "Umur")]
    age: u8,
    #[serde(rename = "Telepon")]
    phone: &'a str,
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Alamat")]
    address: &'a str,
    #[serde(rename = "Nama Ibu")]
    mother: &'a str,
    #[serde(rename = "Nama Ayah")]
    father: &'a str,
    #[serde(rename = "Telepon Ortu")]
    parent_phone: &'a str,
    #[serde(rename = "Total Biaya")]
    fee: u64,
    #[serde(rename = "Tanggal Daftar")]
    registered_on: String,
}

/// Serialize records in the order given. An empty list is refused.
pub fn export_records(records: &[EnrollmentRecord]) -> Result<ExportFile, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for (index, record) in records.iter().enumerate() {
        let applicant = &record.applicant;
        writer.serialize(ExportRow {
            number: index + 1,
            name: &applicant.name,
            sex: applicant.sex.label(),
            tier: applicant.tier.code(),
            age: applicant.age,
            phone: &applicant.guardian_phone,
            email: applicant.guardian_email.as_deref().unwrap_or("-"),
            address: &applicant.address,
            mother: &applicant.mother_name,
            father: &applicant.father_name,
            parent_phone: &applicant.parent_phone,
            fee: applicant.computed_fee,
            registered_on: local_date(record.created_at),
        })?;
    }

    writer.flush().map_err(csv::Error::from)?;
    let bytes = writer
        .into_inner()
        .map_err(|error| ExportError::Buffer(error.to_string()))?;

    Ok(ExportFile {
        file_name: EXPORT_FILE_NAME,
        content_type: EXPORT_CONTENT_TYPE,
        bytes,
    })
}

/// `d/m/yyyy` in Western Indonesia Time.
pub fn local_date(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(WIB_OFFSET_SECONDS) {
        Some(offset) => at.with_timezone(&offset).format("%-d/%-m/%Y").to_string(),
        None => at.format("%-d/%-m/%Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_render_in_wib_without_padding() {
        let late_evening_utc = Utc
            .with_ymd_and_hms(2025, 3, 4, 20, 0, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(local_date(late_evening_utc), "5/3/2025");
    }

    #[test]
    fn empty_export_is_refused() {
        assert!(matches!(export_records(&[]), Err(ExportError::Empty)));
    }
}

use super::domain::{Applicant, EnrollmentSubmission, FeeSchedule, RawAge, Sex, Tier};

pub const MIN_AGE: i64 = 2;
pub const MAX_AGE: i64 = 18;

/// Rejections raised before anything is written. Messages are shown to applicants verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Harap lengkapi semua field yang wajib diisi! ({field})")]
    MissingField { field: &'static str },
    #[error("Umur harus antara 2-18 tahun")]
    AgeOutOfRange { found: i64 },
    #[error("Umur harus berupa angka")]
    InvalidAge { raw: String },
    #[error("Jenjang pendidikan tidak dikenal")]
    UnknownTier,
    #[error("Jenis kelamin tidak dikenal")]
    UnknownSex,
    #[error("Tautan dokumen tidak valid, unggah ulang Kartu Keluarga")]
    UntrustedDocument { url: String },
}

/// Turns a raw submission into an [`Applicant`].
///
/// A document link must sit under the storage's public prefix. Without a
/// prefix any plain `http(s)` link is accepted.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentGuard {
    document_prefix: Option<String>,
}

impl EnrollmentGuard {
    pub fn issued_under(prefix: impl Into<String>) -> Self {
        Self {
            document_prefix: Some(prefix.into()),
        }
    }

    fn document_url(&self, raw: Option<&str>) -> Result<Option<String>, ValidationError> {
        let Some(url) = optional(raw) else {
            return Ok(None);
        };

        let known_origin = match self.document_prefix.as_deref() {
            Some(prefix) => url.len() > prefix.len() && url.starts_with(prefix),
            None => url.starts_with("https://") || url.starts_with("http://"),
        };
        let clean = !url.contains("..")
            && !url
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>'));
        if !known_origin || !clean {
            return Err(ValidationError::UntrustedDocument { url });
        }
        Ok(Some(url))
    }

    pub fn applicant_from_submission(
        &self,
        submission: &EnrollmentSubmission,
        fees: &FeeSchedule,
    ) -> Result<Applicant, ValidationError> {
        let name = required("applicant_name", &submission.applicant_name)?;
        let sex_raw = required("sex", &submission.sex)?;
        let age = submission
            .age
            .as_ref()
            .ok_or(ValidationError::MissingField { field: "age" })?;
        let guardian_phone = required("guardian_phone", &submission.guardian_phone)?;
        let address = required("address", &submission.address)?;
        let tier_raw = required("tier", &submission.tier)?;
        let mother_name = required("mother_name", &submission.mother_name)?;
        let father_name = required("father_name", &submission.father_name)?;
        let parent_phone = required("parent_phone", &submission.parent_phone)?;

        let age = parse_age(age)?;
        let sex = Sex::parse(&sex_raw).ok_or(ValidationError::UnknownSex)?;
        let tier = Tier::parse(&tier_raw).ok_or(ValidationError::UnknownTier)?;
        let document_url = self.document_url(submission.document_url.as_deref())?;

        Ok(Applicant {
            name,
            sex,
            age,
            guardian_phone,
            guardian_email: optional(submission.guardian_email.as_deref()),
            address,
            tier,
            mother_name,
            father_name,
            parent_phone,
            document_url,
            computed_fee: fees.fee_for(Some(tier)),
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Accepts whole numbers in `[MIN_AGE, MAX_AGE]`, either as JSON numbers or digit strings.
pub fn parse_age(raw: &RawAge) -> Result<u8, ValidationError> {
    let value = match raw {
        RawAge::Number(value) => *value,
        RawAge::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(ValidationError::MissingField { field: "age" });
            }
            trimmed
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidAge {
                    raw: trimmed.to_string(),
                })?
        }
    };

    if !(MIN_AGE..=MAX_AGE).contains(&value) {
        return Err(ValidationError::AgeOutOfRange { found: value });
    }

    u8::try_from(value).map_err(|_| ValidationError::AgeOutOfRange { found: value })
}

//! Outbound e-mail for administrator alerts and ad-hoc notifications.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::EmailConfig;

use super::domain::EnrollmentRecord;
use super::fees::format_rupiah;

/// One recipient or several; both shapes are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(address) => address.trim().is_empty(),
            Self::Many(addresses) => addresses.iter().all(|address| address.trim().is_empty()),
        }
    }

    pub fn joined(&self) -> String {
        match self {
            Self::One(address) => address.clone(),
            Self::Many(addresses) => addresses.join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Recipients,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.to.is_empty() {
            return Err(NotifyError::InvalidMessage(
                "penerima (to) wajib diisi".to_string(),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(NotifyError::InvalidMessage(
                "subject tidak boleh kosong".to_string(),
            ));
        }
        let has_body = [&self.html, &self.text]
            .iter()
            .any(|body| body.as_deref().is_some_and(|body| !body.trim().is_empty()));
        if !has_body {
            return Err(NotifyError::InvalidMessage(
                "html atau text wajib diisi".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("layanan email belum dikonfigurasi")]
    NotConfigured,
    #[error("Email admin tidak ditemukan di database.")]
    MissingRecipient,
    #[error("pesan email tidak valid: {0}")]
    InvalidMessage(String),
    #[error("Gagal mengirim email notifikasi: {0}")]
    Transport(String),
    #[error("Gagal mengirim email notifikasi (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers one message.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Posts `{from, to, subject, html, text}` to a Resend-compatible endpoint.
pub struct HttpEmailDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailDispatcher {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &EmailConfig) -> Option<Self> {
        config.api_key.as_ref().map(|key| {
            Self::new(config.api_url.clone(), key.clone(), config.from.clone())
        })
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for HttpEmailDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        message.validate()?;

        let mut body = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
        });
        if let Some(html) = &message.html {
            body["html"] = serde_json::Value::String(html.clone());
        }
        if let Some(text) = &message.text {
            body["text"] = serde_json::Value::String(text.clone());
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(NotifyError::Rejected { status, body });
        }

        info!(to = %message.to.joined(), subject = %message.subject, "email delivered");
        Ok(())
    }
}

/// Used when no e-mail API key is present. Every send fails with `NotConfigured`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDispatcher;

#[async_trait::async_trait]
impl NotificationDispatcher for DisabledDispatcher {
    async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

/// The "new registrant" alert sent to the address in the enrollment settings.
pub fn enrollment_alert(record: &EnrollmentRecord, to: &str) -> EmailMessage {
    let applicant = &record.applicant;
    let subject = format!(
        "Pendaftar Baru: {} ({})",
        applicant.name,
        applicant.tier.code()
    );
    let email = applicant.guardian_email.as_deref().unwrap_or("-");
    let html = format!(
        "<div style=\"font-family: sans-serif; line-height: 1.6; color: #333;\">\
         <h2>Data Pendaftar Baru</h2>\
         <p>Halo Admin Yayasan Amalianur,</p>\
         <p>Ada pendaftar baru yang mengisi formulir:</p>\
         <ul>\
         <li><strong>Nama:</strong> {name}</li>\
         <li><strong>Umur:</strong> {age}</li>\
         <li><strong>Jenjang:</strong> {tier}</li>\
         <li><strong>Telepon:</strong> {phone}</li>\
         <li><strong>Email:</strong> {email}</li>\
         <li><strong>Total Biaya:</strong> {fee}</li>\
         </ul>\
         <p>Silakan login ke dashboard admin untuk melihat detail lengkap.</p>\
         <hr />\
         <p style=\"font-size: 13px; color: #777;\">Email ini dikirim otomatis oleh sistem Yayasan Amalianur.</p>\
         </div>",
        name = escape_html(&applicant.name),
        age = applicant.age,
        tier = applicant.tier.code(),
        phone = escape_html(&applicant.guardian_phone),
        email = escape_html(email),
        fee = format_rupiah(applicant.computed_fee),
    );

    EmailMessage {
        to: Recipients::One(to.to_string()),
        subject,
        html: Some(html),
        text: None,
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

//! Blob storage for uploaded documents and images.
//!
//! Uploads are checked against an [`UploadPolicy`] before the storage backend is
//! touched, so an oversized or wrongly typed file never produces a network or disk
//! write.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use mime::Mime;
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Named storage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Images,
    #[serde(rename = "pendaftaran")]
    Enrollment,
    #[serde(rename = "daftar")]
    Landing,
}

impl Bucket {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Enrollment => "pendaftaran",
            Self::Landing => "daftar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Ukuran file maksimal 5MB")]
    TooLarge { size: usize, max: usize },
    #[error("Format file harus {expected}")]
    UnsupportedType { found: String, expected: String },
    #[error("File kosong")]
    Empty,
    #[error("Gagal mengunggah file: {0}")]
    Transport(String),
}

/// File exactly as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub bucket: Bucket,
    pub path: String,
    pub public_url: String,
}

/// Size and type constraints for one kind of upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_bytes: usize,
    allowed: Vec<&'static str>,
    label: &'static str,
}

impl UploadPolicy {
    /// Family-card scans: images or PDF.
    pub fn documents() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            allowed: vec!["image/jpeg", "image/jpg", "image/png", "application/pdf"],
            label: "JPG, PNG, atau PDF",
        }
    }

    pub fn images() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            allowed: vec!["image/jpeg", "image/jpg", "image/png"],
            label: "JPG atau PNG",
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn check(&self, upload: &Upload) -> Result<(), UploadError> {
        if upload.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: upload.bytes.len(),
                max: self.max_bytes,
            });
        }

        let essence = upload
            .content_type
            .parse::<Mime>()
            .map(|mime| mime.essence_str().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed.contains(&essence.as_str()) {
            return Err(UploadError::UnsupportedType {
                found: upload.content_type.clone(),
                expected: self.label.to_string(),
            });
        }
        Ok(())
    }
}

/// Backend that persists bytes and hands back a public URL.
#[async_trait::async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, UploadError>;

    /// URL prefix every object stored in `bucket` is published under.
    fn public_prefix(&self, bucket: Bucket) -> String;
}

/// Writes under `<root>/<bucket>/<path>` and serves from `<base_url>/<bucket>/<path>`.
#[derive(Debug, Clone)]
pub struct LocalDocumentStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalDocumentStorage {
    pub fn new(root: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stored object for reading. Paths escaping the bucket are refused.
    pub fn resolve(&self, bucket: &str, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        let known = [Bucket::Images, Bucket::Enrollment, Bucket::Landing]
            .iter()
            .any(|candidate| candidate.name() == bucket);
        if !safe || !known || path.is_empty() {
            return None;
        }
        Some(self.root.join(bucket).join(relative))
    }

    pub async fn read(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        let target = self.resolve(bucket, path)?;
        fs::read(target).await.ok()
    }
}

#[async_trait::async_trait]
impl DocumentStorage for LocalDocumentStorage {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, UploadError> {
        let target = self
            .resolve(bucket.name(), path)
            .ok_or_else(|| UploadError::Transport(format!("invalid object path {path}")))?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|error| UploadError::Transport(error.to_string()))?;
        }
        fs::write(&target, &bytes)
            .await
            .map_err(|error| UploadError::Transport(error.to_string()))?;

        Ok(StoredObject {
            bucket,
            path: path.to_string(),
            public_url: format!("{}{}", self.public_prefix(bucket), path),
        })
    }

    fn public_prefix(&self, bucket: Bucket) -> String {
        format!("{}/{}/", self.base_url, bucket.name())
    }
}

/// Keeps objects in memory; counts calls so callers can prove nothing was sent.
#[derive(Debug, Default)]
pub struct MemoryDocumentStorage {
    objects: Mutex<HashMap<(Bucket, String), (String, Vec<u8>)>>,
    calls: AtomicU64,
}

impl MemoryDocumentStorage {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: Bucket, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket, path.to_string()))
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait::async_trait]
impl DocumentStorage for MemoryDocumentStorage {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .map_err(|_| UploadError::Transport("storage lock poisoned".to_string()))?
            .insert(
                (bucket, path.to_string()),
                (content_type.to_string(), bytes),
            );
        Ok(StoredObject {
            bucket,
            path: path.to_string(),
            public_url: format!("{}{}", self.public_prefix(bucket), path),
        })
    }

    fn public_prefix(&self, bucket: Bucket) -> String {
        format!("memory://{}/", bucket.name())
    }
}

static OBJECT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Extension for an accepted content type. The client's file name is ignored.
fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .parse::<Mime>()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .unwrap_or_default();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

fn object_name(upload: &Upload) -> String {
    let extension = extension_for(&upload.content_type);
    let sequence = OBJECT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{sequence}.{extension}", Utc::now().timestamp_millis())
}

/// Validates and stores uploads for one bucket.
#[derive(Clone)]
pub struct DocumentUploader {
    storage: Arc<dyn DocumentStorage>,
    policy: UploadPolicy,
    bucket: Bucket,
}

impl DocumentUploader {
    pub fn new(storage: Arc<dyn DocumentStorage>, policy: UploadPolicy, bucket: Bucket) -> Self {
        Self {
            storage,
            policy,
            bucket,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn public_prefix(&self) -> String {
        self.storage.public_prefix(self.bucket)
    }

    pub async fn upload(&self, upload: Upload) -> Result<StoredObject, UploadError> {
        if let Err(error) = self.policy.check(&upload) {
            warn!(
                bucket = self.bucket.name(),
                file = %upload.file_name,
                size = upload.bytes.len(),
                %error,
                "upload rejected"
            );
            return Err(error);
        }

        let path = object_name(&upload);
        let stored = self
            .storage
            .put(self.bucket, &path, &upload.content_type, upload.bytes)
            .await?;
        info!(bucket = self.bucket.name(), path = %stored.path, "upload stored");
        Ok(stored)
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::enrollment::storage::{
    Bucket, DocumentStorage, DocumentUploader, StoredObject, Upload, UploadError, UploadPolicy,
};
use crate::store::RepositoryError;

use super::repository::ContentRepository;

/// Admin-managed tables that share one list/create/update/delete shape.
///
/// The last five are page-copy tables holding a single row each (the KB and
/// MTs profiles, the home page, contact details and site settings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Posts,
    Programs,
    Gallery,
    Testimonials,
    Schools,
    Kb,
    Mts,
    Home,
    Contact,
    Settings,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 10] = [
        Self::Posts,
        Self::Programs,
        Self::Gallery,
        Self::Testimonials,
        Self::Schools,
        Self::Kb,
        Self::Mts,
        Self::Home,
        Self::Contact,
        Self::Settings,
    ];

    pub const fn table(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Programs => "programs",
            Self::Gallery => "gallery",
            Self::Testimonials => "testimonials",
            Self::Schools => "schools",
            Self::Kb => "kb",
            Self::Mts => "mts",
            Self::Home => "home",
            Self::Contact => "contact",
            Self::Settings => "settings",
        }
    }

    pub const fn is_page(self) -> bool {
        matches!(
            self,
            Self::Kb | Self::Mts | Self::Home | Self::Contact | Self::Settings
        )
    }

    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Posts => &["title", "content"],
            Self::Programs => &["title", "description"],
            Self::Gallery => &["title", "image_url"],
            Self::Testimonials => &["name", "message"],
            Self::Schools => &["name"],
            Self::Kb | Self::Mts => &["title"],
            Self::Contact => &["address", "phone"],
            Self::Home | Self::Settings => &[],
        }
    }

    /// Accepts table names plus the `news` alias for posts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "news" => Some(Self::Posts),
            "galeri" => Some(Self::Gallery),
            table => Self::ALL.into_iter().find(|kind| kind.table() == table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub collection: CollectionKind,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("koleksi \"{0}\" tidak dikenal")]
    UnknownCollection(String),
    #[error("field \"{field}\" wajib diisi")]
    MissingField { field: &'static str },
    #[error("data harus berupa objek JSON")]
    NotAnObject,
    #[error("data tidak ditemukan")]
    NotFound,
    #[error("\"{0}\" bukan halaman tunggal")]
    NotAPage(&'static str),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ContentError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Columns owned by the store; client values for them are dropped.
const RESERVED: [&str; 4] = ["id", "collection", "created_at", "updated_at"];

#[derive(Clone)]
pub struct ManagedCollections {
    repository: Arc<dyn ContentRepository>,
    images: DocumentUploader,
}

impl ManagedCollections {
    pub fn new(repository: Arc<dyn ContentRepository>, storage: Arc<dyn DocumentStorage>) -> Self {
        Self {
            repository,
            images: DocumentUploader::new(storage, UploadPolicy::images(), Bucket::Images),
        }
    }

    pub fn kind(raw: &str) -> Result<CollectionKind, ContentError> {
        CollectionKind::parse(raw).ok_or_else(|| ContentError::UnknownCollection(raw.to_string()))
    }

    pub fn list(&self, kind: CollectionKind) -> Result<Vec<ContentItem>, ContentError> {
        Ok(self.repository.list(kind)?)
    }

    /// Page tables never gain a second row; creating on them saves the page.
    pub fn create(&self, kind: CollectionKind, payload: Value) -> Result<ContentItem, ContentError> {
        if kind.is_page() {
            return self.save_page(kind, payload);
        }
        let fields = sanitize(payload)?;
        check_required(kind, &fields)?;
        let item = self.repository.insert(kind, fields)?;
        info!(table = kind.table(), id = %item.id, "content created");
        Ok(item)
    }

    /// Merge `payload` into the stored fields; required fields are rechecked afterwards.
    pub fn update(
        &self,
        kind: CollectionKind,
        id: &str,
        payload: Value,
    ) -> Result<ContentItem, ContentError> {
        let changes = sanitize(payload)?;
        let mut fields = self
            .repository
            .find(kind, id)?
            .ok_or(ContentError::NotFound)?
            .fields;
        fields.extend(changes);
        check_required(kind, &fields)?;
        let item = self.repository.update(kind, id, fields)?;
        info!(table = kind.table(), id, "content updated");
        Ok(item)
    }

    pub fn delete(&self, kind: CollectionKind, id: &str) -> Result<(), ContentError> {
        self.repository.delete(kind, id)?;
        info!(table = kind.table(), id, "content deleted");
        Ok(())
    }

    pub fn page_kind(raw: &str) -> Result<CollectionKind, ContentError> {
        let kind = Self::kind(raw)?;
        if !kind.is_page() {
            return Err(ContentError::NotAPage(kind.table()));
        }
        Ok(kind)
    }

    /// The page's single row, `None` until it is first saved.
    pub fn page(&self, kind: CollectionKind) -> Result<Option<ContentItem>, ContentError> {
        if !kind.is_page() {
            return Err(ContentError::NotAPage(kind.table()));
        }
        Ok(self.repository.list(kind)?.into_iter().next())
    }

    /// Merge `payload` into the page, creating it on first save.
    pub fn save_page(&self, kind: CollectionKind, payload: Value) -> Result<ContentItem, ContentError> {
        let changes = sanitize(payload)?;
        let mut merged = self
            .page(kind)?
            .map(|item| item.fields)
            .unwrap_or_default();
        merged.extend(changes.clone());
        check_required(kind, &merged)?;

        let item = self.repository.upsert_single(kind, changes)?;
        info!(table = kind.table(), id = %item.id, "page saved");
        Ok(item)
    }

    pub async fn upload_image(&self, upload: Upload) -> Result<StoredObject, ContentError> {
        Ok(self.images.upload(upload).await?)
    }
}

fn sanitize(payload: Value) -> Result<Map<String, Value>, ContentError> {
    let Value::Object(mut fields) = payload else {
        return Err(ContentError::NotAnObject);
    };
    for key in RESERVED {
        fields.remove(key);
    }
    Ok(fields)
}

fn check_required(kind: CollectionKind, fields: &Map<String, Value>) -> Result<(), ContentError> {
    for &field in kind.required_fields() {
        let present = match fields.get(field) {
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !present {
            return Err(ContentError::MissingField { field });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::content::MemoryContentRepository;
    use crate::enrollment::storage::MemoryDocumentStorage;

    fn collections() -> (ManagedCollections, Arc<MemoryDocumentStorage>) {
        let storage = Arc::new(MemoryDocumentStorage::default());
        (
            ManagedCollections::new(Arc::new(MemoryContentRepository::default()), storage.clone()),
            storage,
        )
    }

    #[test]
    fn create_enforces_required_fields_per_kind() {
        let (collections, _) = collections();
        assert_eq!(
            collections.create(CollectionKind::Posts, json!({ "title": "Wisuda" })),
            Err(ContentError::MissingField { field: "content" })
        );
        assert_eq!(
            collections.create(CollectionKind::Schools, json!(["not", "object"])),
            Err(ContentError::NotAnObject)
        );

        let item = collections
            .create(
                CollectionKind::Testimonials,
                json!({ "name": "Bu Rina", "message": "Guru-gurunya sabar", "id": "spoofed" }),
            )
            .expect("created");
        assert_ne!(item.id, "spoofed");
        assert_eq!(item.fields["name"], "Bu Rina");
    }

    #[test]
    fn update_merges_and_rechecks() {
        let (collections, _) = collections();
        let item = collections
            .create(
                CollectionKind::Programs,
                json!({ "title": "Tahfidz", "description": "Hafalan juz 30" }),
            )
            .expect("created");

        let updated = collections
            .update(CollectionKind::Programs, &item.id, json!({ "icon": "book" }))
            .expect("merged");
        assert_eq!(updated.fields["title"], "Tahfidz");
        assert_eq!(updated.fields["icon"], "book");

        assert_eq!(
            collections.update(CollectionKind::Programs, &item.id, json!({ "title": "" })),
            Err(ContentError::MissingField { field: "title" })
        );
        assert_eq!(
            collections.update(CollectionKind::Gallery, &item.id, json!({})),
            Err(ContentError::NotFound)
        );
    }

    #[test]
    fn list_is_newest_first_and_delete_removes() {
        let (collections, _) = collections();
        for title in ["Satu", "Dua"] {
            collections
                .create(CollectionKind::Gallery, json!({ "title": title, "image_url": "x.png" }))
                .expect("created");
        }
        let listed = collections.list(CollectionKind::Gallery).expect("listed");
        assert_eq!(listed[0].fields["title"], "Dua");

        collections
            .delete(CollectionKind::Gallery, &listed[0].id)
            .expect("deleted");
        assert_eq!(collections.list(CollectionKind::Gallery).expect("listed").len(), 1);
        assert_eq!(
            collections.delete(CollectionKind::Gallery, &listed[0].id),
            Err(ContentError::NotFound)
        );
    }

    #[tokio::test]
    async fn image_upload_rejects_pdf_without_storage_call() {
        let (collections, storage) = collections();
        let result = collections
            .upload_image(Upload {
                file_name: "brosur.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: vec![1; 10],
            })
            .await;
        assert!(matches!(
            result,
            Err(ContentError::Upload(UploadError::UnsupportedType { .. }))
        ));
        assert_eq!(storage.calls(), 0);
    }

    #[test]
    fn page_saves_merge_into_one_row() {
        let (collections, _) = collections();
        assert_eq!(collections.page(CollectionKind::Kb), Ok(None));
        assert_eq!(
            collections.page(CollectionKind::Posts),
            Err(ContentError::NotAPage("posts"))
        );

        let first = collections
            .save_page(
                CollectionKind::Kb,
                json!({ "title": "Kelompok Bermain Amalianur", "teachers_count": 4 }),
            )
            .expect("created");
        let second = collections
            .create(
                CollectionKind::Kb,
                json!({ "headmaster": "Bu Aminah", "programs": ["Tahfidz", "Sains"] }),
            )
            .expect("merged through create");

        assert_eq!(first.id, second.id);
        assert_eq!(second.fields["title"], "Kelompok Bermain Amalianur");
        assert_eq!(second.fields["teachers_count"], 4);
        assert_eq!(second.fields["headmaster"], "Bu Aminah");
        assert_eq!(collections.list(CollectionKind::Kb).expect("listed").len(), 1);
    }

    #[test]
    fn page_required_fields_apply_to_the_merged_row() {
        let (collections, _) = collections();
        assert_eq!(
            collections.save_page(CollectionKind::Contact, json!({ "address": "Jl. Amal 5" })),
            Err(ContentError::MissingField { field: "phone" })
        );

        collections
            .save_page(
                CollectionKind::Contact,
                json!({ "address": "Jl. Amal 5", "phone": "061-123" }),
            )
            .expect("saved");
        let updated = collections
            .save_page(CollectionKind::Contact, json!({ "office_hours": "07.00-14.00" }))
            .expect("partial update keeps earlier fields");
        assert_eq!(updated.fields["phone"], "061-123");

        assert_eq!(
            collections.save_page(CollectionKind::Contact, json!({ "phone": " " })),
            Err(ContentError::MissingField { field: "phone" })
        );
    }

    #[test]
    fn concurrent_first_page_saves_create_one_row() {
        let (collections, _) = collections();
        let start = Arc::new(std::sync::Barrier::new(6));
        let handles: Vec<_> = (0..6)
            .map(|step| {
                let collections = collections.clone();
                let start = Arc::clone(&start);
                std::thread::spawn(move || {
                    let mut fields = Map::new();
                    fields.insert(format!("kb_title_{step}"), json!("KB"));
                    start.wait();
                    collections
                        .save_page(CollectionKind::Home, Value::Object(fields))
                        .expect("saved")
                        .id
                })
            })
            .collect();
        let ids: Vec<String> = handles
            .into_iter()
            .map(|handle| handle.join().expect("save thread"))
            .collect();

        assert!(ids.iter().all(|id| id == &ids[0]), "{ids:?}");
        let page = collections
            .page(CollectionKind::Home)
            .expect("page")
            .expect("saved");
        assert_eq!(page.fields.len(), 6);
    }

    #[test]
    fn list_collections_are_not_pages() {
        assert_eq!(
            ManagedCollections::page_kind("posts"),
            Err(ContentError::NotAPage("posts"))
        );
        assert_eq!(ManagedCollections::page_kind("MTS"), Ok(CollectionKind::Mts));
        assert_eq!(ManagedCollections::kind("settings"), Ok(CollectionKind::Settings));
    }

    #[test]
    fn news_is_an_alias_for_posts() {
        assert_eq!(ManagedCollections::kind("news"), Ok(CollectionKind::Posts));
        assert!(matches!(
            ManagedCollections::kind("users"),
            Err(ContentError::UnknownCollection(_))
        ));
    }
}

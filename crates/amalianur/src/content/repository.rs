use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::store::{lock, RepositoryError};

use super::collection::{CollectionKind, ContentItem};

pub trait ContentRepository: Send + Sync {
    /// Newest first.
    fn list(&self, kind: CollectionKind) -> Result<Vec<ContentItem>, RepositoryError>;
    fn find(&self, kind: CollectionKind, id: &str) -> Result<Option<ContentItem>, RepositoryError>;
    fn insert(
        &self,
        kind: CollectionKind,
        fields: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError>;
    fn update(
        &self,
        kind: CollectionKind,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError>;
    fn delete(&self, kind: CollectionKind, id: &str) -> Result<(), RepositoryError>;
    /// Merge `changes` into the table's only row, creating it when the table is empty.
    fn upsert_single(
        &self,
        kind: CollectionKind,
        changes: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct MemoryContentRepository {
    tables: Mutex<HashMap<CollectionKind, Vec<ContentItem>>>,
    sequence: AtomicU64,
}

impl MemoryContentRepository {
    fn new_item(&self, kind: CollectionKind, fields: Map<String, Value>) -> ContentItem {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        ContentItem {
            id: format!("{}-{sequence}", kind.table()),
            collection: kind,
            fields,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ContentRepository for MemoryContentRepository {
    fn list(&self, kind: CollectionKind) -> Result<Vec<ContentItem>, RepositoryError> {
        let tables = lock(&self.tables)?;
        let mut items = tables.get(&kind).cloned().unwrap_or_default();
        items.reverse();
        items.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(items)
    }

    fn find(&self, kind: CollectionKind, id: &str) -> Result<Option<ContentItem>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .get(&kind)
            .and_then(|items| items.iter().find(|item| item.id == id))
            .cloned())
    }

    fn insert(
        &self,
        kind: CollectionKind,
        fields: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let item = self.new_item(kind, fields);
        tables.entry(kind).or_default().push(item.clone());
        Ok(item)
    }

    fn update(
        &self,
        kind: CollectionKind,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let item = tables
            .get_mut(&kind)
            .and_then(|items| items.iter_mut().find(|item| item.id == id))
            .ok_or(RepositoryError::NotFound)?;
        item.fields = fields;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    fn delete(&self, kind: CollectionKind, id: &str) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let items = tables.get_mut(&kind).ok_or(RepositoryError::NotFound)?;
        let position = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(RepositoryError::NotFound)?;
        items.remove(position);
        Ok(())
    }

    fn upsert_single(
        &self,
        kind: CollectionKind,
        changes: Map<String, Value>,
    ) -> Result<ContentItem, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let items = tables.entry(kind).or_default();
        if let Some(item) = items.first_mut() {
            item.fields.extend(changes);
            item.updated_at = Utc::now();
            return Ok(item.clone());
        }
        let item = self.new_item(kind, changes);
        items.push(item.clone());
        Ok(item)
    }
}

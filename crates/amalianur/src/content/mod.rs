//! Uniform admin CRUD over the site's content tables.

pub mod collection;
pub mod repository;
pub mod router;

pub use collection::{CollectionKind, ContentError, ContentItem, ManagedCollections};
pub use repository::{ContentRepository, MemoryContentRepository};
pub use router::content_router;

//! Client library for an Open5e-style tabletop-game content API.
//!
//! Collections are fetched in bulk across the API's pagination, cached once
//! per process with key-based deduplication and single-flight loading, and
//! queried through a pure filter/sort/paginate pipeline whose output a
//! renderer can display directly.

pub mod cache;
pub mod client;
pub mod collection;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod query;
pub mod record;


pub use cache::{CacheStats, CachedRecords, CollectionCacheStats, DeduplicatingCache};
pub use client::{ClientConfig, CodexClient};
pub use collection::{CollectionSource, CollectionType, FilterCategory, SortColumn};
pub use error::{Error, Result};
pub use fetcher::{CollectionFetcher, CollectionPage, RemoteCollectionFetcher};
pub use loader::BulkCollectionLoader;
pub use query::{Order, Page, QueryState};
pub use record::Record;

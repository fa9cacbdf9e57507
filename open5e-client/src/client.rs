use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheStats, CachedRecords, DeduplicatingCache};
use crate::collection::{CollectionSource, CollectionType, FilterCategory, SortColumn};
use crate::error::{Error, Result};
use crate::fetcher::{CollectionFetcher, RemoteCollectionFetcher};
use crate::loader::BulkCollectionLoader;
use crate::query::{self, Page, QueryState};
use crate::record::Record;

/// Result cap for keyword searches, matching the listing page size the API
/// allows for ad-hoc queries.
const SEARCH_LIMIT: usize = 100;

/// Client construction knobs.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the content API.
    pub api_base: String,
    /// Path of the local JSON file backing the feats collection.
    pub feats_path: PathBuf,
    /// Maximum in-flight page requests during a bulk load.
    pub max_in_flight_pages: usize,
    /// Rows per displayed page.
    pub display_page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.open5e.com".to_string(),
            feats_path: PathBuf::from("feats.json"),
            max_in_flight_pages: 8,
            display_page_size: 50,
        }
    }
}

/// The collection currently on screen plus its view state.
struct Session {
    state: QueryState,
    records: CachedRecords,
    /// Position within the remote listing, for collections that are
    /// browsed one server page at a time instead of bulk-cached.
    remote: Option<RemoteWindow>,
}

/// Where the current server page sits in the remote listing. The API's
/// `next`/`previous` tokens say whether a neighbouring page exists.
struct RemoteWindow {
    offset: usize,
    next_page: Option<String>,
    previous_page: Option<String>,
}

/// Front door for renderers: owns the cache and the per-session view
/// state, and hands back `Page`s ready for display.
pub struct CodexClient {
    fetcher: Arc<dyn CollectionFetcher>,
    cache: DeduplicatingCache,
    config: ClientConfig,
    session: Option<Session>,
}

impl CodexClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let fetcher: Arc<dyn CollectionFetcher> = Arc::new(RemoteCollectionFetcher::new(
            config.api_base.clone(),
            config.feats_path.clone(),
        ));
        Self::with_fetcher(fetcher, config)
    }

    /// Construction seam for tests and alternate transports.
    pub fn with_fetcher(fetcher: Arc<dyn CollectionFetcher>, config: ClientConfig) -> Self {
        let loader = BulkCollectionLoader::new(fetcher.clone(), config.max_in_flight_pages);
        Self {
            fetcher,
            cache: DeduplicatingCache::new(loader),
            config,
            session: None,
        }
    }

    /// Show a collection. Bulk-cached types load once per process; other
    /// types fetch their first listing page fresh. Switching to a
    /// different collection resets filters, sort, and page position.
    pub async fn request_collection(&mut self, collection: CollectionType) -> Result<Page> {
        let (records, remote) = if collection.bulk_cached() {
            (self.cache.get(collection).await?, None)
        } else {
            let envelope = self
                .fetcher
                .fetch_page(collection, collection.page_size(), 0)
                .await?;
            let window = RemoteWindow {
                offset: 0,
                next_page: envelope.next_page,
                previous_page: envelope.previous_page,
            };
            let records = Arc::new(envelope.results.into_iter().map(Arc::new).collect());
            (records, Some(window))
        };

        let session = match self.session.take() {
            Some(mut session) if session.state.collection() == collection => {
                session.records = records;
                session.remote = remote;
                session
            }
            _ => Session {
                state: QueryState::new(collection, self.config.display_page_size),
                records,
                remote,
            },
        };

        let page = query::run(&session.records, &session.state);
        self.session = Some(session);
        Ok(page)
    }

    /// Step to the next server page of a remotely-browsed collection.
    /// `None` when there is no further page, the current collection is
    /// bulk-cached, or nothing is on screen yet.
    pub async fn next_remote_page(&mut self) -> Result<Option<Page>> {
        self.step_remote_page(true).await
    }

    /// Step back to the previous server page; the counterpart of
    /// [`next_remote_page`](Self::next_remote_page).
    pub async fn prev_remote_page(&mut self) -> Result<Option<Page>> {
        self.step_remote_page(false).await
    }

    async fn step_remote_page(&mut self, forward: bool) -> Result<Option<Page>> {
        let (collection, offset) = match self.session.as_ref() {
            Some(Session {
                state,
                remote: Some(window),
                ..
            }) => {
                let page_size = state.collection().page_size();
                let offset = if forward {
                    if window.next_page.is_none() {
                        return Ok(None);
                    }
                    window.offset + page_size
                } else {
                    if window.previous_page.is_none() {
                        return Ok(None);
                    }
                    window.offset.saturating_sub(page_size)
                };
                (state.collection(), offset)
            }
            _ => return Ok(None),
        };

        let envelope = self
            .fetcher
            .fetch_page(collection, collection.page_size(), offset)
            .await?;

        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.records = Arc::new(envelope.results.into_iter().map(Arc::new).collect());
        session.remote = Some(RemoteWindow {
            offset,
            next_page: envelope.next_page,
            previous_page: envelope.previous_page,
        });
        // fresh server page, so the display window starts over; filters
        // and sort carry across
        session.state.set_page(1);
        Ok(Some(query::run(&session.records, &session.state)))
    }

    /// Re-filter the current collection. Facets not declared for it are
    /// ignored. No-op before any collection has been requested.
    pub fn set_filter(
        &mut self,
        category: FilterCategory,
        values: impl IntoIterator<Item = String>,
    ) -> Option<Page> {
        let session = self.session.as_mut()?;
        if session
            .state
            .collection()
            .filter_categories()
            .contains(&category)
        {
            session.state.set_filter(category, values);
        } else {
            log::debug!(
                "ignoring filter {category} for {}",
                session.state.collection()
            );
        }
        Some(query::run(&session.records, &session.state))
    }

    pub fn clear_filter(&mut self, category: FilterCategory) -> Option<Page> {
        let session = self.session.as_mut()?;
        session.state.clear_filter(category);
        Some(query::run(&session.records, &session.state))
    }

    /// Sort by a column, toggling direction on re-selection. Columns not
    /// declared for the collection are ignored.
    pub fn set_sort(&mut self, column: SortColumn) -> Option<Page> {
        let session = self.session.as_mut()?;
        if session.state.collection().sort_columns().contains(&column) {
            session.state.set_sort(column);
        } else {
            log::debug!(
                "ignoring sort column {column} for {}",
                session.state.collection()
            );
        }
        Some(query::run(&session.records, &session.state))
    }

    /// Jump to a 1-indexed page. Requests outside `1..=total_pages` keep
    /// the current page.
    pub fn set_page(&mut self, page_number: usize) -> Option<Page> {
        let session = self.session.as_mut()?;
        let total_pages = query::page_count(&session.records, &session.state);
        if (1..=total_pages).contains(&page_number) {
            session.state.set_page(page_number);
        } else {
            log::debug!("rejecting out-of-range page {page_number} (1..={total_pages})");
        }
        Some(query::run(&session.records, &session.state))
    }

    pub fn query_state(&self) -> Option<&QueryState> {
        self.session.as_ref().map(|session| &session.state)
    }

    /// Keyword search against the API, narrowed to records whose name
    /// actually contains the query (the API's matching is fuzzier).
    pub async fn search(
        &self,
        collection: CollectionType,
        query: &str,
    ) -> Result<Vec<Arc<Record>>> {
        let page = self.fetcher.search(collection, query, SEARCH_LIMIT).await?;
        let needle = query.to_lowercase();
        Ok(page
            .results
            .into_iter()
            .filter(|record| record.name().to_lowercase().contains(&needle))
            .map(Arc::new)
            .collect())
    }

    /// Resolve one record by key for a detail view. Remote lookups go
    /// straight to the API, uncached; the local-file collection resolves
    /// from its loaded records.
    pub async fn fetch_detail(&self, collection: CollectionType, key: &str) -> Result<Record> {
        match collection.source() {
            CollectionSource::Remote => self.fetcher.fetch_detail(collection, key).await,
            CollectionSource::LocalFile { .. } => {
                let records = self.cache.get(collection).await?;
                records
                    .iter()
                    .find(|record| record.key() == key || record.name() == key)
                    .map(|record| Record::clone(record))
                    .ok_or_else(|| Error::RecordNotFound {
                        collection,
                        key: key.to_string(),
                    })
            }
        }
    }

    /// Warm a bulk-cached collection ahead of first use, so the first
    /// render is instant. Non-cached collections are a no-op.
    pub async fn prewarm(&self, collection: CollectionType) -> Result<()> {
        if !collection.bulk_cached() {
            return Ok(());
        }
        self.cache.prewarm(collection).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl Default for CodexClient {
    fn default() -> Self {
        Self::new()
    }
}

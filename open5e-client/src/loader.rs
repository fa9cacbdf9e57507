use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::collection::CollectionType;
use crate::error::{Error, Result};
use crate::fetcher::CollectionFetcher;
use crate::record::Record;

/// Materializes a whole paginated collection.
///
/// The first page reveals the total count; the remaining pages are fetched
/// with several requests in flight at once and stitched back together in
/// ascending offset order, whatever order the responses arrive in. Any
/// failed page fails the whole load, so a partially fetched collection
/// never escapes.
pub struct BulkCollectionLoader {
    fetcher: Arc<dyn CollectionFetcher>,
    max_in_flight: usize,
}

impl BulkCollectionLoader {
    pub fn new(fetcher: Arc<dyn CollectionFetcher>, max_in_flight: usize) -> Self {
        Self {
            fetcher,
            // one outstanding request would serialize the load
            max_in_flight: max_in_flight.max(2),
        }
    }

    pub async fn load_all(&self, collection: CollectionType) -> Result<Vec<Record>> {
        let page_size = collection.page_size();
        let first = self
            .fetcher
            .fetch_page(collection, page_size, 0)
            .await
            .map_err(|source| Error::PartialLoad {
                page: 0,
                source: Box::new(source),
            })?;

        let total = first.total_count;
        let total_pages = total.div_ceil(page_size).max(1);
        log::debug!("{collection}: {total} records across {total_pages} pages");

        let mut records = first.results;
        if total_pages > 1 {
            let fetcher = &self.fetcher;
            // buffered keeps up to max_in_flight requests outstanding but
            // yields results in page order, so concatenation below is
            // already offset order
            let pages: Vec<Result<Vec<Record>>> = stream::iter(1..total_pages)
                .map(|page| async move {
                    fetcher
                        .fetch_page(collection, page_size, page * page_size)
                        .await
                        .map(|envelope| envelope.results)
                        .map_err(|source| Error::PartialLoad {
                            page,
                            source: Box::new(source),
                        })
                })
                .buffered(self.max_in_flight)
                .collect()
                .await;

            for page in pages {
                records.extend(page?);
            }
        }

        log::info!("loaded {} records for {collection}", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::CollectionPage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves a fixed record list in slices, counting calls. Optionally
    /// fails one offset, and delays early pages so later ones finish first.
    struct SliceFetcher {
        records: Vec<Record>,
        calls: AtomicUsize,
        fail_offset: Option<usize>,
        stagger: bool,
    }

    impl SliceFetcher {
        fn new(count: usize) -> Self {
            let records = (0..count)
                .map(|i| {
                    serde_json::from_value(json!({"slug": format!("record-{i:04}"), "name": format!("Record {i:04}")}))
                        .unwrap()
                })
                .collect();
            Self {
                records,
                calls: AtomicUsize::new(0),
                fail_offset: None,
                stagger: false,
            }
        }
    }

    #[async_trait]
    impl CollectionFetcher for SliceFetcher {
        async fn fetch_page(
            &self,
            _collection: CollectionType,
            limit: usize,
            offset: usize,
        ) -> crate::error::Result<CollectionPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_offset == Some(offset) {
                return Err(Error::Network(format!("offset {offset} unavailable")));
            }
            if self.stagger && offset > 0 {
                // earlier offsets wait longer, so completion order is the
                // reverse of page order
                let pages_left = (self.records.len() - offset) / limit.max(1);
                tokio::time::sleep(Duration::from_millis(20 * pages_left as u64)).await;
            }
            let results = self
                .records
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect();
            Ok(CollectionPage {
                total_count: self.records.len(),
                next_page: None,
                previous_page: None,
                results,
            })
        }

        async fn fetch_detail(
            &self,
            collection: CollectionType,
            key: &str,
        ) -> crate::error::Result<Record> {
            self.records
                .iter()
                .find(|record| record.key() == key)
                .cloned()
                .ok_or_else(|| Error::RecordNotFound {
                    collection,
                    key: key.to_string(),
                })
        }

        async fn search(
            &self,
            _collection: CollectionType,
            _query: &str,
            _limit: usize,
        ) -> crate::error::Result<CollectionPage> {
            unimplemented!("not exercised by loader tests")
        }
    }

    #[tokio::test]
    async fn concatenation_follows_offset_order_not_completion_order() {
        let mut fetcher = SliceFetcher::new(1200);
        fetcher.stagger = true;
        let loader = BulkCollectionLoader::new(Arc::new(fetcher), 8);

        let records = loader.load_all(CollectionType::Spells).await.unwrap();
        assert_eq!(records.len(), 1200);
        let keys: Vec<&str> = records.iter().map(Record::key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "records must be in ascending offset order");
    }

    #[tokio::test]
    async fn page_count_matches_total() {
        let fetcher = Arc::new(SliceFetcher::new(1200));
        let loader = BulkCollectionLoader::new(fetcher.clone(), 4);

        loader.load_all(CollectionType::Spells).await.unwrap();
        // 1200 records at page size 500 -> pages at offsets 0, 500, 1000
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_page_collections_need_one_request() {
        let fetcher = Arc::new(SliceFetcher::new(40));
        let loader = BulkCollectionLoader::new(fetcher.clone(), 4);

        let records = loader.load_all(CollectionType::Spells).await.unwrap();
        assert_eq!(records.len(), 40);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn any_failed_page_fails_the_whole_load() {
        let mut fetcher = SliceFetcher::new(1200);
        fetcher.fail_offset = Some(500);
        let loader = BulkCollectionLoader::new(Arc::new(fetcher), 4);

        let result = loader.load_all(CollectionType::Spells).await;
        match result {
            Err(Error::PartialLoad { page, source }) => {
                assert_eq!(page, 1);
                assert!(matches!(*source, Error::Network(_)));
            }
            other => panic!("expected PartialLoad, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_page_failure_is_wrapped_too() {
        let mut fetcher = SliceFetcher::new(100);
        fetcher.fail_offset = Some(0);
        let loader = BulkCollectionLoader::new(Arc::new(fetcher), 4);

        let result = loader.load_all(CollectionType::Spells).await;
        assert!(matches!(result, Err(Error::PartialLoad { page: 0, .. })));
    }
}

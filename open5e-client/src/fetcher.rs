use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::collection::{CollectionSource, CollectionType};
use crate::error::{Error, Result};
use crate::record::Record;

/// One page of a collection listing, in the API's envelope shape.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPage {
    #[serde(rename = "count")]
    pub total_count: usize,
    #[serde(rename = "next")]
    pub next_page: Option<String>,
    #[serde(rename = "previous")]
    pub previous_page: Option<String>,
    pub results: Vec<Record>,
}

/// One-shot fetch operations against a collection's backing source.
///
/// The trait seam keeps the loader and cache testable without a network;
/// failures surface unchanged to the caller, with no retry at this layer.
#[async_trait]
pub trait CollectionFetcher: Send + Sync {
    /// Fetch one page of `collection` at the given offset.
    async fn fetch_page(
        &self,
        collection: CollectionType,
        limit: usize,
        offset: usize,
    ) -> Result<CollectionPage>;

    /// Resolve one record by key, bypassing any cache.
    async fn fetch_detail(&self, collection: CollectionType, key: &str) -> Result<Record>;

    /// Keyword search using the API's own matching.
    async fn search(
        &self,
        collection: CollectionType,
        query: &str,
        limit: usize,
    ) -> Result<CollectionPage>;
}

/// HTTP fetcher for the Open5e-style API, plus the local-file source for
/// the one collection that ships as a static JSON file.
pub struct RemoteCollectionFetcher {
    api_base: String,
    feats_path: PathBuf,
}

impl RemoteCollectionFetcher {
    pub fn new(api_base: impl Into<String>, feats_path: impl Into<PathBuf>) -> Self {
        Self {
            api_base: api_base.into(),
            feats_path: feats_path.into(),
        }
    }

    async fn get_envelope(&self, url: &str) -> Result<CollectionPage> {
        let body = self.get_body(url).await?;
        serde_json::from_str(&body).map_err(|error| Error::Format(error.to_string()))
    }

    async fn get_body(&self, url: &str) -> Result<String> {
        log::debug!("GET {url}");
        let mut response = surf::get(url)
            .await
            .map_err(|error| Error::Network(error.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        response
            .body_string()
            .await
            .map_err(|error| Error::Network(error.to_string()))
    }

    /// Read the static file and expose it through the same envelope shape
    /// as a remote listing, so callers cannot tell the sources apart.
    async fn fetch_local(
        &self,
        field: &'static str,
        limit: usize,
        offset: usize,
    ) -> Result<CollectionPage> {
        let records = self.read_local(field).await?;
        let total_count = records.len();
        let results = records.into_iter().skip(offset).take(limit).collect();
        Ok(CollectionPage {
            total_count,
            next_page: None,
            previous_page: None,
            results,
        })
    }

    async fn read_local(&self, field: &'static str) -> Result<Vec<Record>> {
        let raw = tokio::fs::read_to_string(&self.feats_path)
            .await
            .map_err(|error| {
                Error::Network(format!("{}: {error}", self.feats_path.display()))
            })?;
        let mut document: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|error| Error::Format(error.to_string()))?;
        let records = document
            .remove(field)
            .ok_or_else(|| Error::Format(format!("missing top-level '{field}' field")))?;
        serde_json::from_value(records).map_err(|error| Error::Format(error.to_string()))
    }
}

#[async_trait]
impl CollectionFetcher for RemoteCollectionFetcher {
    async fn fetch_page(
        &self,
        collection: CollectionType,
        limit: usize,
        offset: usize,
    ) -> Result<CollectionPage> {
        match collection.source() {
            CollectionSource::LocalFile { field } => self.fetch_local(field, limit, offset).await,
            CollectionSource::Remote => {
                let url = format!(
                    "{}/{collection}/?limit={limit}&offset={offset}",
                    self.api_base
                );
                self.get_envelope(&url).await
            }
        }
    }

    async fn fetch_detail(&self, collection: CollectionType, key: &str) -> Result<Record> {
        if let CollectionSource::LocalFile { field } = collection.source() {
            let records = self.read_local(field).await?;
            return records
                .into_iter()
                .find(|record| record.key() == key || record.name() == key)
                .ok_or_else(|| Error::RecordNotFound {
                    collection,
                    key: key.to_string(),
                });
        }

        let url = format!("{}/{collection}/{key}/", self.api_base);
        let body = self.get_body(&url).await?;
        serde_json::from_str(&body).map_err(|error| Error::Format(error.to_string()))
    }

    async fn search(
        &self,
        collection: CollectionType,
        query: &str,
        limit: usize,
    ) -> Result<CollectionPage> {
        let url = format!(
            "{}/{collection}/?search={}&limit={limit}",
            self.api_base,
            urlencoding::encode(query)
        );
        self.get_envelope(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_the_api_shape() {
        let body = r#"{
            "count": 1381,
            "next": "https://api.open5e.com/spells/?limit=500&offset=500",
            "previous": null,
            "results": [{"slug": "wish", "name": "Wish", "level": "9th-level"}]
        }"#;

        let page: CollectionPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 1381);
        assert!(page.next_page.is_some());
        assert!(page.previous_page.is_none());
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].key(), "wish");
    }

    #[test]
    fn envelope_rejects_non_object_records() {
        let body = r#"{"count": 1, "next": null, "previous": null, "results": ["wish"]}"#;
        assert!(serde_json::from_str::<CollectionPage>(body).is_err());
    }

    #[tokio::test]
    async fn local_file_serves_the_feats_field() {
        let path = std::env::temp_dir().join("open5e-client-feats-test.json");
        std::fs::write(
            &path,
            r#"{"feats": [
                {"name": "Alert", "prerequisites": null, "source": "PHB"},
                {"name": "Lucky", "prerequisites": null, "source": "PHB"}
            ]}"#,
        )
        .unwrap();

        let fetcher = RemoteCollectionFetcher::new("http://unused.invalid", &path);
        let page = fetcher.fetch_page(CollectionType::Feats, 500, 0).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.results[0].name(), "Alert");
        assert!(page.next_page.is_none());

        let detail = fetcher
            .fetch_detail(CollectionType::Feats, "Lucky")
            .await
            .unwrap();
        assert_eq!(detail.name(), "Lucky");

        let missing = fetcher.fetch_detail(CollectionType::Feats, "Tough").await;
        assert!(matches!(missing, Err(Error::RecordNotFound { .. })));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn local_file_with_wrong_field_is_a_format_error() {
        let path = std::env::temp_dir().join("open5e-client-badfeats-test.json");
        std::fs::write(&path, r#"{"results": []}"#).unwrap();

        let fetcher = RemoteCollectionFetcher::new("http://unused.invalid", &path);
        let result = fetcher.fetch_page(CollectionType::Feats, 500, 0).await;
        assert!(matches!(result, Err(Error::Format(_))));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn unreadable_local_file_is_a_network_error() {
        let fetcher = RemoteCollectionFetcher::new(
            "http://unused.invalid",
            "/nonexistent/open5e-feats.json",
        );
        let result = fetcher.fetch_page(CollectionType::Feats, 500, 0).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}

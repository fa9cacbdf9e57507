use crate::collection::CollectionType;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for collection loading and lookups.
///
/// Clone-able on purpose: a failed bulk load is fanned out to every caller
/// waiting on the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Transport failure or a non-success HTTP status.
    #[error("network request failed: {0}")]
    Network(String),
    /// The response body could not be parsed into the expected envelope.
    #[error("unexpected response format: {0}")]
    Format(String),
    /// A page of a bulk load failed. Nothing is cached; the next request
    /// for the collection retries the whole load.
    #[error("bulk load failed at page {page}: {source}")]
    PartialLoad {
        page: usize,
        #[source]
        source: Box<Error>,
    },
    /// Detail lookup for a key that does not exist in the collection.
    #[error("no record '{key}' in {collection}")]
    RecordNotFound {
        collection: CollectionType,
        key: String,
    },
}

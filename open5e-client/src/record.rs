use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One domain entity returned by the content API.
///
/// The field set varies per collection (monsters carry stat blocks, spells
/// carry casting info), so the record stays an opaque field map and typed
/// access goes through accessors. Records are immutable after fetch and
/// shared as `Arc<Record>` once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Stable identifier within the collection: the `slug` where the API
    /// provides one, otherwise the record name.
    pub fn key(&self) -> &str {
        self.str_field("slug")
            .or_else(|| self.str_field("name"))
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.str_field("name").unwrap_or_default()
    }

    /// Publication source, defaulting to the SRD when the API omits it.
    pub fn source(&self) -> &str {
        self.str_field("document__title").unwrap_or("SRD")
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

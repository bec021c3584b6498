use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── Field Names ────────────────────────────────────────────────────────────

/// Field name for the title of a document.
pub const TITLE: &str = "title";

/// Field name for the short summary of a document (the search engine snippet).
pub const SUMMARY: &str = "summary";

/// Field name for the URL pointing to the full version of a document.
pub const CONTENT_URL: &str = "url";

/// Field name for the detected language of a document.
pub const LANGUAGE: &str = "language";

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Identifier assigned to a document when it enters the pipeline.
///
/// Unique within one processing request. Two documents with equal contents get
/// different identifiers, and identifiers are not stable across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language code attached to a document, e.g. `en`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(pub String);

impl LanguageTag {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Raw Documents ──────────────────────────────────────────────────────────

/// A document as delivered by the ingestion boundary, before it has an identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl RawDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Builds a raw document with a title, summary and content URL.
    pub fn create(
        title: impl Into<String>,
        summary: impl Into<String>,
        content_url: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            snippet: Some(summary.into()),
            url: Some(content_url.into()),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

// ─── Documents ──────────────────────────────────────────────────────────────

/// A document flowing through the pipeline: an identifier plus named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    fields: BTreeMap<String, serde_json::Value>,
}

impl Document {
    /// Assigns `id` to a raw document. Only the pipeline ingestion step calls this.
    pub(crate) fn from_raw(id: DocumentId, raw: RawDocument) -> Self {
        let mut fields = raw.properties;
        if let Some(title) = raw.title {
            fields.insert(TITLE.into(), serde_json::Value::String(title));
        }
        if let Some(snippet) = raw.snippet {
            fields.insert(SUMMARY.into(), serde_json::Value::String(snippet));
        }
        if let Some(url) = raw.url {
            fields.insert(CONTENT_URL.into(), serde_json::Value::String(url));
        }
        Self { id, fields }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// All fields of this document.
    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// String value of a field, `None` if missing or not a string.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    pub(crate) fn set_field(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn title(&self) -> Option<&str> {
        self.text_field(TITLE)
    }

    pub fn summary(&self) -> Option<&str> {
        self.text_field(SUMMARY)
    }

    pub fn content_url(&self) -> Option<&str> {
        self.text_field(CONTENT_URL)
    }

    pub fn language(&self) -> Option<LanguageTag> {
        self.text_field(LANGUAGE).map(LanguageTag::new)
    }
}

// ─── Clusters ───────────────────────────────────────────────────────────────

/// A labeled group of documents. Clusters may overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Label phrases, best first. Never empty for a returned cluster.
    pub labels: Vec<String>,
    /// Member documents in ascending id order. Never empty for a returned cluster.
    pub documents: Vec<DocumentId>,
    /// Ranking score, higher is better.
    pub score: f64,
}

impl Cluster {
    /// The primary label.
    pub fn label(&self) -> &str {
        self.labels.first().map(|s| s.as_str()).unwrap_or("")
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.documents.binary_search(&id).is_ok()
    }
}

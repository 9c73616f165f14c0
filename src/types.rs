//! Core data model shared by every component (spec §3).

use serde::{Deserialize, Serialize};

/// Media type of a content item's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Web,
    Image,
    Video,
    Pdf,
    Markdown,
}

/// The unit of replication. Wire format matches the blob layout in spec §6
/// exactly so `serialise`/`deserialise` round-trip without a translation
/// layer at the object-store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub content_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub media_type: MediaType,
    /// Comma-joined tag list, e.g. `"rust,networking"`.
    #[serde(default)]
    pub tags: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ContentItem {
    /// Split `tags` on commas, trimming whitespace and dropping empties.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Key this item is stored under in the object store (spec §4.2).
    pub fn object_key(&self) -> String {
        format!("items/{}.json", self.id)
    }
}

/// One mutation of a content item. Append-only, never mutated (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub item_id: String,
    pub operation: ChangeOperation,
    pub version: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

/// A detected divergence between local and remote state. Append-only,
/// presented for user awareness, never consulted for re-resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub item_id: String,
    pub local_timestamp: i64,
    pub remote_timestamp: i64,
    pub resolution: String,
    pub detected_at: i64,
}

/// Ring-buffered record of one non-fatal per-item sync failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub timestamp: i64,
    pub item_id: Option<String>,
    pub operation: String,
    pub error: String,
}

/// Which analysis tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Ai,
    Textrank,
    Tfidf,
}

/// Detected input language for tokenisation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Cjk,
}

/// Output of one content-analysis run (spec §3, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub content_id: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub language: Language,
    pub method: AnalysisMethod,
    pub confidence: f32,
    pub ai_used: bool,
}

//! Core data models shared by the stores, the gateway and the HTTP API.
//!
//! Everything serializes with camelCase field names so the JSON API matches
//! the shapes the remote model is asked to produce.

use serde::{Deserialize, Serialize};

/// A file read into memory and encoded for inline transport to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedFile {
    pub name: String,
    /// Path inside the selected folder, or the file name for loose files.
    pub relative_path: String,
    /// Standard-alphabet base64 of the file contents.
    pub data: String,
    pub mime_type: String,
}

impl IngestedFile {
    /// Decoded payload size, derived from the base64 length.
    pub fn size_bytes(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }
}

/// Where a knowledge-base entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SourceKind {
    LocalFolder,
}

/// A named bundle of ingested files treated as one retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseEntry {
    pub id: String,
    pub name: String,
    pub source_path: String,
    pub kind: SourceKind,
    pub files: Vec<IngestedFile>,
}

impl AsRef<KnowledgeBaseEntry> for KnowledgeBaseEntry {
    fn as_ref(&self) -> &KnowledgeBaseEntry {
        self
    }
}

/// Listing view of an entry, without file payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub id: String,
    pub name: String,
    pub source_path: String,
    pub kind: SourceKind,
    pub file_count: usize,
    pub total_bytes: usize,
}

impl From<&KnowledgeBaseEntry> for EntrySummary {
    fn from(entry: &KnowledgeBaseEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            source_path: entry.source_path.clone(),
            kind: entry.kind,
            file_count: entry.files.len(),
            total_bytes: entry.files.iter().map(IngestedFile::size_bytes).sum(),
        }
    }
}

/// One row of the knowledge-base file explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    pub entry_id: String,
    pub name: String,
    pub relative_path: String,
    pub mime_type: String,
    pub size_kb: usize,
}

/// An external reference site the model should prefer when it searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stakeholder {
    pub id: String,
    pub name: String,
    pub region: String,
    pub department: String,
    pub role: String,
    pub detail: String,
    pub source: String,
    /// `YYYY-MM-DD`, local time.
    pub date_logged: String,
}

/// Field-wise update for a [`Stakeholder`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StakeholderPatch {
    pub name: Option<String>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub detail: Option<String>,
    pub source: Option<String>,
    pub date_logged: Option<String>,
}

impl StakeholderPatch {
    pub fn apply(self, target: &mut Stakeholder) {
        let fields = [
            (self.name, &mut target.name),
            (self.region, &mut target.region),
            (self.department, &mut target.department),
            (self.role, &mut target.role),
            (self.detail, &mut target.detail),
            (self.source, &mut target.source),
            (self.date_logged, &mut target.date_logged),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// A stakeholder as returned by the extraction call, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedStakeholder {
    pub name: Option<String>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub department_chinese: Option<String>,
    pub role: Option<String>,
    pub role_chinese: Option<String>,
    pub detail: Option<String>,
    pub detail_chinese: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingUrl {
    pub title: String,
    pub uri: String,
}

/// Bilingual answer plus the web references the model cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub answer_english: String,
    pub answer_chinese: String,
    pub grounding_urls: Vec<GroundingUrl>,
}

/// Counters shown next to the query console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub knowledge_base_entries: usize,
    pub files: usize,
    pub active_rag_sources: usize,
    pub stakeholders: usize,
}

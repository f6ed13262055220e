//! In-memory stores: knowledge base, RAG source registry, stakeholders.
//!
//! Each store is an ordered `Vec` keyed by opaque ids. Operations on an
//! unknown id are silent no-ops; return values say whether anything changed.
//! Synchronization is the caller's concern (see [`crate::dashboard`]).

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::RagSourceConfig;
use crate::fallbacks::{self, or_fallback};
use crate::ids::IdGenerator;
use crate::models::{
    ExtractedStakeholder, FileListing, KnowledgeBaseEntry, RagSource, Stakeholder,
    StakeholderPatch,
};

// ═══════════════════════════════════════════════════════════════════════
// Knowledge base
// ═══════════════════════════════════════════════════════════════════════

/// Entries are held behind `Arc` so request handlers can snapshot them
/// without copying file payloads.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    entries: Vec<Arc<KnowledgeBaseEntry>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: KnowledgeBaseEntry) -> Arc<KnowledgeBaseEntry> {
        let entry = Arc::new(entry);
        self.entries.push(entry.clone());
        entry
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> Vec<Arc<KnowledgeBaseEntry>> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().map(|e| e.files.len()).sum()
    }

    /// Files whose name or relative path contains `query`, case-insensitively.
    /// An empty query lists every file.
    pub fn filter_files(&self, query: &str) -> Vec<FileListing> {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .flat_map(|entry| {
                entry.files.iter().map(move |file| (entry.id.as_str(), file))
            })
            .filter(|(_, file)| {
                needle.is_empty()
                    || file.name.to_lowercase().contains(&needle)
                    || file.relative_path.to_lowercase().contains(&needle)
            })
            .map(|(entry_id, file)| FileListing {
                entry_id: entry_id.to_string(),
                name: file.name.clone(),
                relative_path: file.relative_path.clone(),
                mime_type: file.mime_type.clone(),
                size_kb: file.size_bytes() / 1024,
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RAG sources
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct RagRegistry {
    sources: Vec<RagSource>,
}

impl RagRegistry {
    pub fn seeded(seed: &[RagSourceConfig], ids: &dyn IdGenerator) -> Self {
        let sources = seed
            .iter()
            .map(|s| RagSource {
                id: ids.next_id(),
                name: s.name.clone(),
                url: s.url.clone(),
                active: s.active,
            })
            .collect();
        Self { sources }
    }

    /// Flip `active` for `id`, returning the new value.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let source = self.sources.iter_mut().find(|s| s.id == id)?;
        source.active = !source.active;
        Some(source.active)
    }

    pub fn all(&self) -> Vec<RagSource> {
        self.sources.clone()
    }

    pub fn active(&self) -> Vec<RagSource> {
        self.sources.iter().filter(|s| s.active).cloned().collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Stakeholders
// ═══════════════════════════════════════════════════════════════════════

/// Values given to a manually added row.
pub mod manual_defaults {
    pub const NAME: &str = "New Stakeholder";
    pub const REGION: &str = "Global";
    pub const DEPARTMENT: &str = "General / 一般";
    pub const ROLE: &str = "Consultant / 顧問";
    pub const DETAIL: &str = "Manual entry. / 手動輸入紀錄";
    pub const SOURCE: &str = "Manual Entry";
}

#[derive(Debug, Default)]
pub struct StakeholderStore {
    records: Vec<Stakeholder>,
}

impl StakeholderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row with the manual-entry defaults.
    pub fn add_manual(&mut self, ids: &dyn IdGenerator, date: NaiveDate) -> Stakeholder {
        let record = Stakeholder {
            id: ids.next_id(),
            name: manual_defaults::NAME.to_string(),
            region: manual_defaults::REGION.to_string(),
            department: manual_defaults::DEPARTMENT.to_string(),
            role: manual_defaults::ROLE.to_string(),
            detail: manual_defaults::DETAIL.to_string(),
            source: manual_defaults::SOURCE.to_string(),
            date_logged: format_date(date),
        };
        self.records.push(record.clone());
        record
    }

    pub fn insert(&mut self, record: Stakeholder) {
        self.records.push(record);
    }

    /// Merge `patch` into the record with `id`, returning the updated record.
    pub fn update(&mut self, id: &str, patch: StakeholderPatch) -> Option<Stakeholder> {
        let record = self.records.iter_mut().find(|s| s.id == id)?;
        patch.apply(record);
        Some(record.clone())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|s| s.id != id);
        self.records.len() != before
    }

    /// Append one record per extracted item, filling gaps from
    /// [`crate::fallbacks`]. Returns the appended records.
    pub fn append_extracted(
        &mut self,
        items: Vec<ExtractedStakeholder>,
        ids: &dyn IdGenerator,
        date: NaiveDate,
    ) -> Vec<Stakeholder> {
        let date_logged = format_date(date);
        let appended: Vec<Stakeholder> = items
            .into_iter()
            .map(|item| Stakeholder {
                id: ids.next_id(),
                name: or_fallback(item.name.as_deref(), fallbacks::STAKEHOLDER_NAME),
                region: or_fallback(item.region.as_deref(), fallbacks::STAKEHOLDER_REGION),
                department: bilingual(
                    item.department,
                    item.department_chinese,
                    fallbacks::STAKEHOLDER_DEPARTMENT,
                ),
                role: bilingual(item.role, item.role_chinese, fallbacks::STAKEHOLDER_ROLE),
                detail: bilingual(
                    item.detail,
                    item.detail_chinese,
                    fallbacks::STAKEHOLDER_DETAIL,
                ),
                source: or_fallback(item.source.as_deref(), fallbacks::STAKEHOLDER_SOURCE),
                date_logged: date_logged.clone(),
            })
            .collect();
        self.records.extend(appended.iter().cloned());
        appended
    }

    pub fn all(&self) -> Vec<Stakeholder> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the table as CSV (RFC 4180 quoting, CRLF line endings).
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Name,Region,Department,Role,Detail,Source,Date Logged\r\n");
        for s in &self.records {
            let row = [
                &s.name,
                &s.region,
                &s.department,
                &s.role,
                &s.detail,
                &s.source,
                &s.date_logged,
            ]
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
            out.push_str(&row);
            out.push_str("\r\n");
        }
        out
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Combine an English value and its Chinese counterpart as `"en / zh"`.
fn bilingual(english: Option<String>, chinese: Option<String>, fallback: &str) -> String {
    let english = english.filter(|v| !v.trim().is_empty());
    let chinese = chinese.filter(|v| !v.trim().is_empty());
    match (english, chinese) {
        (Some(en), Some(zh)) => format!("{} / {}", en, zh),
        (Some(en), None) => en,
        (None, Some(zh)) => zh,
        (None, None) => fallback.to_string(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

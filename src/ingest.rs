//! Knowledge-base ingestion.
//!
//! Filters a [`Selection`] to admissible documents, reads each one fully,
//! base64-encodes it and wraps the batch in a single [`KnowledgeBaseEntry`].
//! A batch either succeeds as a whole or produces nothing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::IngestConfig;
use crate::connector_fs::{FileSource, SelectedFile, Selection};
use crate::ids::IdGenerator;
use crate::models::{IngestedFile, KnowledgeBaseEntry, SourceKind};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};

/// MIME type used when a file's type is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";
/// Entry name for a folder pick whose files carry no folder prefix.
pub const FOLDER_FALLBACK_NAME: &str = "Local Import";
/// Entry name for a pick of loose files.
pub const LOOSE_FILES_NAME: &str = "Selected Files";

const ADMITTED_TYPE_MARKERS: [&str; 5] = ["pdf", "text", "word", "document", "presentation"];
const ADMITTED_EXTENSIONS: [&str; 3] = [".md", ".json", ".csv"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No supported documents found. Select PDFs, text files, CSVs, or Office documents.")]
    NoSupportedDocuments,

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Whether a selected file is admitted into the knowledge base.
///
/// Admitted when its type looks like a document, its name carries one of the
/// structured-text extensions, or it is smaller than `max_fallback_bytes`.
pub fn is_admissible(file: &SelectedFile, max_fallback_bytes: u64) -> bool {
    let type_ok = file
        .reported_type
        .as_deref()
        .map(|t| ADMITTED_TYPE_MARKERS.iter().any(|m| t.contains(m)))
        .unwrap_or(false);
    let ext_ok = ADMITTED_EXTENSIONS
        .iter()
        .any(|ext| file.name.ends_with(ext));

    type_ok || ext_ok || file.size < max_fallback_bytes
}

/// Display name for the entry built from `selection`.
pub fn entry_name(selection: &Selection) -> String {
    let first_segment = selection
        .files
        .first()
        .and_then(|f| f.relative_path.split('/').next())
        .filter(|segment| !segment.is_empty());

    match first_segment {
        Some(segment) => segment.to_string(),
        None if selection.is_folder => FOLDER_FALLBACK_NAME.to_string(),
        None => LOOSE_FILES_NAME.to_string(),
    }
}

/// Ingest a selection into a new, not yet stored, knowledge-base entry.
pub async fn ingest_selection(
    selection: Selection,
    config: &IngestConfig,
    ids: &dyn IdGenerator,
    progress: &dyn IngestProgressReporter,
) -> Result<KnowledgeBaseEntry, IngestError> {
    progress.report(IngestProgressEvent::Reading {
        selected: selection.files.len() as u64,
    });

    let name = entry_name(&selection);
    let admitted: Vec<SelectedFile> = selection
        .files
        .into_iter()
        .filter(|f| is_admissible(f, config.max_fallback_bytes))
        .collect();

    if admitted.is_empty() {
        tracing::info!("selection contained no supported documents");
        return Err(IngestError::NoSupportedDocuments);
    }

    progress.report(IngestProgressEvent::Processing {
        admitted: admitted.len() as u64,
    });

    let mut files = Vec::with_capacity(admitted.len());
    for file in admitted {
        files.push(read_file(file).await?);
    }

    let entry = KnowledgeBaseEntry {
        id: ids.next_id(),
        source_path: format!("local://{}", name),
        name,
        kind: SourceKind::LocalFolder,
        files,
    };

    tracing::info!(entry = %entry.name, files = entry.files.len(), "ingested knowledge base entry");
    progress.report(IngestProgressEvent::Done {
        entry: entry.name.clone(),
        files: entry.files.len() as u64,
    });

    Ok(entry)
}

async fn read_file(file: SelectedFile) -> Result<IngestedFile, IngestError> {
    let bytes = match file.source {
        FileSource::Memory(bytes) => bytes,
        FileSource::Path(path) => {
            tokio::fs::read(&path)
                .await
                .map_err(|source| IngestError::Read {
                    path: path.display().to_string(),
                    source,
                })?
        }
    };

    let relative_path = if file.relative_path.is_empty() {
        file.name.clone()
    } else {
        file.relative_path
    };

    Ok(IngestedFile {
        name: file.name,
        relative_path,
        data: STANDARD.encode(&bytes),
        mime_type: file
            .reported_type
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
    })
}

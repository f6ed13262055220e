//! Filesystem selection: the local stand-in for a file picker.
//!
//! Turns the folders and loose files a user points at into a [`Selection`]
//! of [`SelectedFile`] handles. Nothing is read here beyond metadata; the
//! ingestor decides which handles are admitted and reads them.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::ingest::IngestError;

/// Where a selected file's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// An opaque handle to one user-selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    /// `"<folder>/<path inside folder>"` for folder selections, empty for
    /// loose files.
    pub relative_path: String,
    /// MIME type reported for the file, if recognised.
    pub reported_type: Option<String>,
    pub size: u64,
    pub source: FileSource,
}

impl SelectedFile {
    /// Build an in-memory handle. The reported type is detected from `name`.
    pub fn from_bytes(
        name: impl Into<String>,
        relative_path: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let name = name.into();
        Self {
            reported_type: detect_content_type(&name).map(str::to_string),
            relative_path: relative_path.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
            name,
        }
    }
}

/// The files chosen in one pick, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub files: Vec<SelectedFile>,
    /// True when at least one folder was picked.
    pub is_folder: bool,
}

impl Selection {
    pub fn from_files(files: Vec<SelectedFile>, is_folder: bool) -> Self {
        Self { files, is_folder }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Expand filesystem paths into a [`Selection`].
///
/// Directories are walked recursively in file-name order, skipping the
/// default VCS/build excludes plus `config.exclude_globs`. Plain files are
/// taken as loose files with an empty relative path.
pub fn select_paths(paths: &[PathBuf], config: &IngestConfig) -> Result<Selection, IngestError> {
    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut selection = Selection::default();

    for root in paths {
        if !root.exists() {
            return Err(IngestError::PathNotFound(root.clone()));
        }

        if root.is_file() {
            selection.files.push(path_to_selected(root, String::new())?);
            continue;
        }

        selection.is_folder = true;
        let folder = folder_name(root);

        let walker = WalkDir::new(root)
            .follow_links(config.follow_symlinks)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|source| IngestError::Walk {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) {
                continue;
            }

            let relative_path = if folder.is_empty() {
                rel_str
            } else {
                format!("{}/{}", folder, rel_str)
            };
            selection.files.push(path_to_selected(path, relative_path)?);
        }
    }

    tracing::debug!(
        files = selection.files.len(),
        folder = selection.is_folder,
        "selection built"
    );

    Ok(selection)
}

fn path_to_selected(path: &Path, relative_path: String) -> Result<SelectedFile, IngestError> {
    let metadata = std::fs::metadata(path).map_err(|source| IngestError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(SelectedFile {
        reported_type: detect_content_type(&name).map(str::to_string),
        relative_path,
        size: metadata.len(),
        source: FileSource::Path(path.to_path_buf()),
        name,
    })
}

/// Last component of a folder path, resolving `.` and `..` when possible.
fn folder_name(root: &Path) -> String {
    let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Detect a MIME type from a file extension.
pub fn detect_content_type(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "yaml" | "yml" => "text/yaml",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(content_type)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

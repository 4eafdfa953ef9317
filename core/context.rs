use crate::config::PathFormat;
use crate::gather::parent_dir;
use crate::secrets::DetectedSecret;
use crate::tokens;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

/// One processed file, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub relative_path: String,
    #[serde(skip)]
    pub absolute_path: PathBuf,
    pub language: &'static str,
    pub content: String,
    pub line_count: usize,
    /// Size on disk, before any transformation.
    pub byte_size: u64,
    pub estimated_tokens: usize,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

impl FileEntry {
    pub fn new(
        relative_path: String,
        absolute_path: PathBuf,
        language: &'static str,
        content: String,
        byte_size: u64,
    ) -> Self {
        Self {
            line_count: content.lines().count(),
            estimated_tokens: tokens::estimate(&content),
            relative_path,
            absolute_path,
            language,
            content,
            byte_size,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.relative_path)
    }

    pub fn parent_dir(&self) -> &str {
        parent_dir(&self.relative_path)
    }

    /// Lowercased extension without the dot, `""` when there is none.
    pub fn extension(&self) -> String {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }

    pub fn display_path(&self, format: PathFormat) -> String {
        match format {
            PathFormat::Relative => self.relative_path.clone(),
            PathFormat::Absolute => self.absolute_path.to_string_lossy().into_owned(),
            PathFormat::FileName => self.file_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportMetadata {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_bytes: u64,
    pub estimated_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_author: Option<String>,
    pub secrets_found: usize,
    pub pii_found: usize,
}

impl ExportMetadata {
    /// Aggregate counters over the processed entries.
    pub fn from_entries(entries: &[FileEntry], files_skipped: usize) -> Self {
        Self {
            files_processed: entries.len(),
            files_skipped,
            total_bytes: entries.iter().map(|e| e.byte_size).sum(),
            estimated_tokens: entries.iter().map(|e| e.estimated_tokens).sum(),
            ..Default::default()
        }
    }

    pub fn context_window(&self) -> &'static str {
        tokens::context_window_fit(self.estimated_tokens)
    }
}

/// An ordered group of files that is rendered as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub files: Vec<FileEntry>,
    pub estimated_tokens: usize,
    pub estimated_bytes: u64,
    /// 0-based.
    pub index: usize,
    pub total: usize,
}

impl Chunk {
    pub fn new(files: Vec<FileEntry>) -> Self {
        Self {
            estimated_tokens: files.iter().map(|f| f.estimated_tokens).sum(),
            estimated_bytes: files.iter().map(|f| f.content.len() as u64).sum(),
            files,
            index: 0,
            total: 0,
        }
    }

    pub fn summary(&self) -> ChunkSummary {
        ChunkSummary {
            index: self.index,
            total: self.total,
            paths: self.files.iter().map(|f| f.relative_path.clone()).collect(),
            estimated_tokens: self.estimated_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub total: usize,
    pub paths: Vec<String>,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretFinding {
    pub path: String,
    pub secret: DetectedSecret,
}

/// Result of one export run.
#[derive(Debug, Clone)]
pub struct FormattedOutput {
    pub content: String,
    pub metadata: ExportMetadata,
    /// Empty unless the run was chunked.
    pub chunks: Vec<ChunkSummary>,
    pub findings: Vec<SecretFinding>,
}

impl FormattedOutput {
    pub fn was_chunked(&self) -> bool {
        !self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry::new(
            path.to_string(),
            PathBuf::from("/p").join(path),
            "text",
            content.to_string(),
            content.len() as u64,
        )
    }

    #[test]
    fn entry_path_helpers() {
        let e = entry("src/lib/Mod.RS", "x");
        assert_eq!(e.file_name(), "Mod.RS");
        assert_eq!(e.parent_dir(), "src/lib");
        assert_eq!(e.extension(), "rs");
        assert_eq!(entry("Makefile", "").extension(), "");
        assert_eq!(entry(".gitignore", "").extension(), "");
        assert_eq!(e.display_path(PathFormat::FileName), "Mod.RS");
        assert_eq!(e.display_path(PathFormat::Absolute), "/p/src/lib/Mod.RS");
    }

    #[test]
    fn metadata_sums_entries() {
        let entries = vec![entry("a.txt", "hello\nworld\n"), entry("b.txt", "x")];
        let metadata = ExportMetadata::from_entries(&entries, 3);
        assert_eq!(metadata.files_processed, 2);
        assert_eq!(metadata.files_skipped, 3);
        assert_eq!(metadata.total_bytes, 13);
        assert_eq!(
            metadata.estimated_tokens,
            entries[0].estimated_tokens + entries[1].estimated_tokens
        );
        assert_eq!(entries[0].line_count, 2);
    }
}

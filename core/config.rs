use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_DIR: &str = ".xexport";
pub const DEFAULT_CONFIG_FILENAME: &str = "xexport.toml";
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 2048;
pub const DEFAULT_MAX_TOKENS: usize = 100_000;
pub const DEFAULT_FILES_PER_CHUNK: usize = 50;
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 8;

/// Options for a single export run.
///
/// Built once by the caller (CLI flags layered over an optional TOML file) and
/// passed by reference through every stage. Nothing in the pipeline mutates it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportOptions {
    #[serde(default)]
    pub project_name: Option<String>,

    // Filtering
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    #[serde(default)]
    pub use_regex_filtering: bool,
    #[serde(default)]
    pub regex_pattern: String,
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,
    #[serde(default)]
    pub min_file_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_only_modified_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub min_line_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_line_count: Option<usize>,

    // Content
    #[serde(default)]
    pub include_line_numbers: bool,
    #[serde(default)]
    pub strip_comments: bool,
    #[serde(default)]
    pub strip_whitespace: bool,
    #[serde(default = "default_true")]
    pub collapse_blank_lines: bool,
    #[serde(default)]
    pub extract_todos: bool,
    #[serde(default)]
    pub extract_doc_comments: bool,
    #[serde(default = "default_true")]
    pub detect_secrets: bool,
    #[serde(default = "default_true")]
    pub mask_secrets: bool,
    #[serde(default = "default_true")]
    pub warn_pii: bool,

    // Output
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_git_info: bool,
    #[serde(default = "default_true")]
    pub include_timestamp: bool,
    #[serde(default)]
    pub include_table_of_contents: bool,
    #[serde(default = "default_true")]
    pub include_statistics: bool,
    #[serde(default)]
    pub path_format: PathFormat,
    #[serde(default = "default_true")]
    pub group_by_directory: bool,
    #[serde(default)]
    pub sort_files: SortOrder,

    // Chunking
    #[serde(default)]
    pub enable_chunking: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub chunk_strategy: ChunkStrategy,
    #[serde(default = "default_files_per_chunk")]
    pub files_per_chunk: usize,

    // Scheduling
    #[serde(default = "default_true")]
    pub concurrent_processing: bool,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    MarkdownToc,
    Xml,
    Json,
    PlainText,
    Html,
    MarkdownClaude,
    MarkdownChatgpt,
    MarkdownGemini,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    #[default]
    BySize,
    ByFileCount,
    ByDirectory,
    ByFileType,
    Smart,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathFormat {
    #[default]
    Relative,
    Absolute,
    FileName,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    PathAlphabetical,
    NameAlphabetical,
    SizeAscending,
    SizeDescending,
    ModifiedDate,
    Extension,
}

fn default_true() -> bool {
    true
}
fn default_max_file_size_kb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_KB
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_files_per_chunk() -> usize {
    DEFAULT_FILES_PER_CHUNK
}
fn default_max_concurrent_tasks() -> usize {
    DEFAULT_MAX_CONCURRENT_TASKS
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            project_name: None,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            respect_gitignore: default_true(),
            use_regex_filtering: false,
            regex_pattern: String::new(),
            max_file_size_kb: default_max_file_size_kb(),
            min_file_size_bytes: 0,
            max_file_size_bytes: None,
            include_only_modified_after: None,
            min_line_count: 0,
            max_line_count: None,
            include_line_numbers: false,
            strip_comments: false,
            strip_whitespace: false,
            collapse_blank_lines: default_true(),
            extract_todos: false,
            extract_doc_comments: false,
            detect_secrets: default_true(),
            mask_secrets: default_true(),
            warn_pii: default_true(),
            output_format: OutputFormat::default(),
            include_metadata: default_true(),
            include_git_info: false,
            include_timestamp: default_true(),
            include_table_of_contents: false,
            include_statistics: default_true(),
            path_format: PathFormat::default(),
            group_by_directory: default_true(),
            sort_files: SortOrder::default(),
            enable_chunking: false,
            max_tokens: default_max_tokens(),
            chunk_strategy: ChunkStrategy::default(),
            files_per_chunk: default_files_per_chunk(),
            concurrent_processing: default_true(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

impl ExportOptions {
    /// `--project-root`, else `PROJECT_ROOT`, else the working directory; `~` expanded.
    pub fn determine_project_root(explicit: Option<&PathBuf>) -> Result<PathBuf> {
        let requested = explicit
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));
        let root = match requested {
            Some(raw) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
            None => env::current_dir()?,
        };
        root.canonicalize()
            .map_err(|source| AppError::FileRead { path: root, source })
    }

    /// Config file for this run. An explicit value with a directory part is a
    /// path; a bare name means `<root>/.xexport/<name>.toml`. Without one, the
    /// default file is used when it exists.
    pub fn resolve_config_path(
        project_root: &Path,
        explicit: Option<&str>,
        disabled: bool,
    ) -> Result<Option<PathBuf>> {
        if disabled {
            log::debug!("Config file loading disabled.");
            return Ok(None);
        }
        let Some(raw) = explicit else {
            let default_path = default_config_path(project_root);
            log::debug!(
                "Default config {} {}",
                default_path.display(),
                if default_path.is_file() { "found" } else { "not present" }
            );
            return Ok(default_path.is_file().then_some(default_path));
        };

        let requested = PathBuf::from(shellexpand::tilde(raw).as_ref());
        let path = if requested.is_absolute() || requested.components().count() > 1 {
            requested
        } else {
            project_root
                .join(DEFAULT_CONFIG_DIR)
                .join(requested)
                .with_extension("toml")
        };
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        log::debug!("Using config file {}", path.display());
        Ok(Some(path))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<ExportOptions>(content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.project_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "UnknownProject".to_string())
        })
    }

    /// Upper byte bound, combining `max_file_size_bytes` and `max_file_size_kb`.
    pub fn effective_max_bytes(&self) -> u64 {
        let kb_limit = self.max_file_size_kb.saturating_mul(1024);
        match self.max_file_size_bytes {
            Some(bytes) => bytes.min(kb_limit),
            None => kb_limit,
        }
    }

    /// TOC is on for the dedicated format, or when requested for any markdown flavour.
    pub fn wants_table_of_contents(&self) -> bool {
        match self.output_format {
            OutputFormat::MarkdownToc => true,
            format if format.is_markdown() => self.include_table_of_contents,
            _ => false,
        }
    }
}

pub fn default_config_path(project_root: &Path) -> PathBuf {
    project_root
        .join(DEFAULT_CONFIG_DIR)
        .join(DEFAULT_CONFIG_FILENAME)
}

/// Splits a comma or newline separated pattern string into trimmed, non-empty patterns.
pub fn parse_pattern_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 9] = [
        OutputFormat::Markdown,
        OutputFormat::MarkdownToc,
        OutputFormat::Xml,
        OutputFormat::Json,
        OutputFormat::PlainText,
        OutputFormat::Html,
        OutputFormat::MarkdownClaude,
        OutputFormat::MarkdownChatgpt,
        OutputFormat::MarkdownGemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::MarkdownToc => "markdown_toc",
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::PlainText => "plain_text",
            OutputFormat::Html => "html",
            OutputFormat::MarkdownClaude => "markdown_claude",
            OutputFormat::MarkdownChatgpt => "markdown_chatgpt",
            OutputFormat::MarkdownGemini => "markdown_gemini",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::PlainText => "txt",
            OutputFormat::Html => "html",
            _ => "md",
        }
    }

    pub fn is_markdown(&self) -> bool {
        matches!(
            self,
            OutputFormat::Markdown
                | OutputFormat::MarkdownToc
                | OutputFormat::MarkdownClaude
                | OutputFormat::MarkdownChatgpt
                | OutputFormat::MarkdownGemini
        )
    }
}

impl ChunkStrategy {
    pub const ALL: [ChunkStrategy; 5] = [
        ChunkStrategy::BySize,
        ChunkStrategy::ByFileCount,
        ChunkStrategy::ByDirectory,
        ChunkStrategy::ByFileType,
        ChunkStrategy::Smart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::BySize => "by_size",
            ChunkStrategy::ByFileCount => "by_file_count",
            ChunkStrategy::ByDirectory => "by_directory",
            ChunkStrategy::ByFileType => "by_file_type",
            ChunkStrategy::Smart => "smart",
        }
    }
}

impl PathFormat {
    pub const ALL: [PathFormat; 3] = [PathFormat::Relative, PathFormat::Absolute, PathFormat::FileName];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathFormat::Relative => "relative",
            PathFormat::Absolute => "absolute",
            PathFormat::FileName => "file_name",
        }
    }
}

impl SortOrder {
    pub const ALL: [SortOrder; 6] = [
        SortOrder::PathAlphabetical,
        SortOrder::NameAlphabetical,
        SortOrder::SizeAscending,
        SortOrder::SizeDescending,
        SortOrder::ModifiedDate,
        SortOrder::Extension,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::PathAlphabetical => "path_alphabetical",
            SortOrder::NameAlphabetical => "name_alphabetical",
            SortOrder::SizeAscending => "size_ascending",
            SortOrder::SizeDescending => "size_descending",
            SortOrder::ModifiedDate => "modified_date",
            SortOrder::Extension => "extension",
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_lowercase().replace('-', "_");
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        AppError::InvalidArgument(format!("Unknown {} '{}'", $what, s))
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_conversions!(OutputFormat, "output format");
impl_str_conversions!(ChunkStrategy, "chunk strategy");
impl_str_conversions!(PathFormat, "path format");
impl_str_conversions!(SortOrder, "sort order");

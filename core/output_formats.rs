//! Rendering of processed files into the supported output encodings.
//!
//! All formats share the same preparation: entries are sorted, optionally
//! grouped by parent directory, and given a display path and a unique anchor
//! slug. [`render`] is the single dispatch point over [`OutputFormat`].

/// Appends one formatted line to a `String` buffer.
macro_rules! push_line {
    ($out:expr, $($arg:tt)*) => {{
        $out.push_str(&format!($($arg)*));
        $out.push('\n');
    }};
}

mod html;
mod json;
mod markdown;
mod plain_text;
mod xml;

use crate::config::{ExportOptions, OutputFormat, SortOrder};
use crate::context::{ExportMetadata, FileEntry};
use crate::error::Result;
use byte_unit::{Byte, UnitType};
use indexmap::IndexMap;
use log;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const RULE_WIDTH: usize = 80;

pub fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn light_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

pub fn render(
    entries: &[FileEntry],
    options: &ExportOptions,
    metadata: &ExportMetadata,
) -> Result<String> {
    log::debug!(
        "Rendering {} files as {}",
        entries.len(),
        options.output_format
    );
    let ctx = RenderContext::new(entries, options, metadata);
    match options.output_format {
        OutputFormat::Markdown
        | OutputFormat::MarkdownToc
        | OutputFormat::MarkdownClaude
        | OutputFormat::MarkdownChatgpt
        | OutputFormat::MarkdownGemini => Ok(markdown::render(&ctx)),
        OutputFormat::Xml => xml::render(&ctx),
        OutputFormat::Json => json::render(&ctx),
        OutputFormat::PlainText => Ok(plain_text::render(&ctx)),
        OutputFormat::Html => Ok(html::render(&ctx)),
    }
}

/// A file as it appears in the output.
pub(crate) struct RenderedFile<'a> {
    pub entry: &'a FileEntry,
    pub path: String,
    pub slug: String,
}

pub(crate) struct FileGroup<'a> {
    /// `None` when the output is not grouped.
    pub directory: Option<&'a str>,
    pub files: Vec<RenderedFile<'a>>,
}

pub(crate) struct RenderContext<'a> {
    pub options: &'a ExportOptions,
    pub metadata: &'a ExportMetadata,
    pub groups: Vec<FileGroup<'a>>,
}

impl<'a> RenderContext<'a> {
    fn new(
        entries: &'a [FileEntry],
        options: &'a ExportOptions,
        metadata: &'a ExportMetadata,
    ) -> Self {
        let sorted = sort_entries(entries, options.sort_files);
        let mut used_slugs = HashSet::new();
        let rendered = sorted.into_iter().map(|entry| {
            let path = entry.display_path(options.path_format);
            let slug = unique_slug(&slugify(&entry.relative_path), &mut used_slugs);
            RenderedFile { entry, path, slug }
        });

        let groups = if options.group_by_directory {
            let mut by_dir: IndexMap<&'a str, Vec<RenderedFile<'a>>> = IndexMap::new();
            for file in rendered {
                by_dir.entry(file.entry.parent_dir()).or_default().push(file);
            }
            by_dir
                .into_iter()
                .map(|(directory, files)| FileGroup {
                    directory: Some(directory),
                    files,
                })
                .collect()
        } else {
            vec![FileGroup {
                directory: None,
                files: rendered.collect(),
            }]
        };

        Self {
            options,
            metadata,
            groups,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &RenderedFile<'a>> {
        self.groups.iter().flat_map(|g| g.files.iter())
    }

    pub fn project_name(&self) -> &str {
        self.metadata.project_name.as_deref().unwrap_or("project")
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::collect(self.files().map(|f| f.entry), self.metadata)
    }

    /// Label/value pairs for the metadata header, in display order.
    pub fn metadata_fields(&self) -> Vec<(&'static str, String)> {
        let m = self.metadata;
        let mut fields = vec![("Project", self.project_name().to_string())];
        if let Some(ts) = m.timestamp {
            fields.push(("Generated", ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
        }
        if let Some(branch) = &m.git_branch {
            fields.push(("Branch", branch.clone()));
        }
        if let Some(commit) = &m.git_commit {
            fields.push(("Commit", commit.clone()));
        }
        if let Some(author) = &m.git_author {
            fields.push(("Author", author.clone()));
        }
        fields.push(("Files", m.files_processed.to_string()));
        if m.files_skipped > 0 {
            fields.push(("Skipped", m.files_skipped.to_string()));
        }
        fields.push(("Total Size", human_size(m.total_bytes)));
        fields.push((
            "Estimated Tokens",
            format!("{} ({})", m.estimated_tokens, m.context_window()),
        ));
        fields
    }
}

/// Directory label for grouped output.
pub(crate) fn directory_label(directory: &str) -> String {
    if directory.is_empty() {
        "./".to_string()
    } else {
        format!("{}/", directory)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub files: usize,
    pub skipped: usize,
    pub total_size: String,
    pub estimated_tokens: usize,
    pub context_window: &'static str,
    pub languages: Vec<LanguageCount>,
}

impl Statistics {
    fn collect<'e>(entries: impl Iterator<Item = &'e FileEntry>, metadata: &ExportMetadata) -> Self {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        let mut files = 0;
        let mut bytes = 0;
        let mut tokens = 0;
        for entry in entries {
            *counts.entry(entry.language).or_default() += 1;
            files += 1;
            bytes += entry.byte_size;
            tokens += entry.estimated_tokens;
        }
        let mut languages: Vec<LanguageCount> = counts
            .into_iter()
            .map(|(language, files)| LanguageCount {
                language: language.to_string(),
                files,
            })
            .collect();
        languages.sort_by(|a, b| b.files.cmp(&a.files).then_with(|| a.language.cmp(&b.language)));
        Self {
            files,
            skipped: metadata.files_skipped,
            total_size: human_size(bytes),
            estimated_tokens: tokens,
            context_window: crate::tokens::context_window_fit(tokens),
            languages,
        }
    }
}

pub fn human_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

pub fn sort_entries(entries: &[FileEntry], order: SortOrder) -> Vec<&FileEntry> {
    let mut sorted: Vec<&FileEntry> = entries.iter().collect();
    let by_path = |a: &&FileEntry, b: &&FileEntry| a.relative_path.cmp(&b.relative_path);
    match order {
        SortOrder::PathAlphabetical => sorted.sort_by(by_path),
        SortOrder::NameAlphabetical => {
            sorted.sort_by(|a, b| a.file_name().cmp(b.file_name()).then_with(|| by_path(a, b)))
        }
        SortOrder::SizeAscending => {
            sorted.sort_by(|a, b| a.byte_size.cmp(&b.byte_size).then_with(|| by_path(a, b)))
        }
        SortOrder::SizeDescending => {
            sorted.sort_by(|a, b| b.byte_size.cmp(&a.byte_size).then_with(|| by_path(a, b)))
        }
        // newest first, unknown times last
        SortOrder::ModifiedDate => sorted.sort_by(|a, b| {
            let by_time = match (a.modified, b.modified) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_time.then_with(|| by_path(a, b))
        }),
        SortOrder::Extension => {
            sorted.sort_by(|a, b| a.extension().cmp(&b.extension()).then_with(|| by_path(a, b)))
        }
    }
    sorted
}

/// Lowercases and turns every non-alphanumeric character into `-`.
pub fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                '-'
            }
        })
        .collect()
}

fn unique_slug(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathFormat;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    pub(crate) fn entry(path: &str, language: &'static str, content: &str) -> FileEntry {
        FileEntry::new(
            path.to_string(),
            PathBuf::from("/p").join(path),
            language,
            content.to_string(),
            content.len() as u64,
        )
    }

    pub(crate) fn sample_entries() -> Vec<FileEntry> {
        vec![
            entry("src/main.rs", "rust", "fn main() {\n    println!(\"<hi> & 'bye'\");\n}\n"),
            entry("README.md", "markdown", "# Demo\n\n```sh\ncargo run\n```\n"),
            entry("src/lib.rs", "rust", "pub mod a;\n"),
            entry("scripts/tricky.py", "python", "s = ']]>'\nprint(\"\\\"quoted\\\"\\n\")\n"),
        ]
    }

    pub(crate) fn sample_metadata(entries: &[FileEntry]) -> ExportMetadata {
        let mut metadata = ExportMetadata::from_entries(entries, 2);
        metadata.project_name = Some("demo".to_string());
        metadata
    }

    fn paths(sorted: &[&FileEntry]) -> Vec<String> {
        sorted.iter().map(|e| e.relative_path.clone()).collect()
    }

    #[test]
    fn human_size_uses_binary_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(5 * 1024 * 1024), "5 MiB");
    }

    #[test]
    fn slugs_are_lowercase_and_dashed() {
        assert_eq!(slugify("src/Main.rs"), "src-main-rs");
        let mut used = HashSet::new();
        assert_eq!(unique_slug("a-b", &mut used), "a-b");
        assert_eq!(unique_slug("a-b", &mut used), "a-b-2");
    }

    #[test]
    fn sort_orders() {
        let now = SystemTime::now();
        let entries = vec![
            entry("b/zz.txt", "text", "12345").with_modified(Some(now - Duration::from_secs(60))),
            entry("a/yy.rs", "rust", "1").with_modified(Some(now)),
            entry("c/aa.md", "markdown", "123").with_modified(None),
        ];
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::PathAlphabetical)),
            vec!["a/yy.rs", "b/zz.txt", "c/aa.md"]
        );
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::NameAlphabetical)),
            vec!["c/aa.md", "a/yy.rs", "b/zz.txt"]
        );
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::SizeAscending)),
            vec!["a/yy.rs", "c/aa.md", "b/zz.txt"]
        );
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::SizeDescending)),
            vec!["b/zz.txt", "c/aa.md", "a/yy.rs"]
        );
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::ModifiedDate)),
            vec!["a/yy.rs", "b/zz.txt", "c/aa.md"]
        );
        assert_eq!(
            paths(&sort_entries(&entries, SortOrder::Extension)),
            vec!["c/aa.md", "a/yy.rs", "b/zz.txt"]
        );
    }

    #[test]
    fn grouping_follows_sorted_order() {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        let options = ExportOptions::default();
        let ctx = RenderContext::new(&entries, &options, &metadata);
        let dirs: Vec<_> = ctx.groups.iter().map(|g| g.directory).collect();
        assert_eq!(dirs, vec![Some(""), Some("scripts"), Some("src")]);
        assert_eq!(ctx.groups[2].files.len(), 2);

        let flat = ExportOptions {
            group_by_directory: false,
            path_format: PathFormat::FileName,
            ..Default::default()
        };
        let ctx = RenderContext::new(&entries, &flat, &metadata);
        assert_eq!(ctx.groups.len(), 1);
        assert_eq!(ctx.groups[0].files[0].path, "README.md");
        assert_eq!(ctx.groups[0].files[1].path, "tricky.py");
    }

    #[test]
    fn statistics_count_languages() {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        let options = ExportOptions::default();
        let stats = RenderContext::new(&entries, &options, &metadata).statistics();
        assert_eq!(stats.files, 4);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.languages[0], LanguageCount { language: "rust".into(), files: 2 });
        assert_eq!(stats.languages.len(), 3);
    }

    #[test]
    fn every_format_mentions_each_path() {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        for format in OutputFormat::ALL {
            let options = ExportOptions {
                output_format: format,
                ..Default::default()
            };
            let out = render(&entries, &options, &metadata).unwrap();
            for e in &entries {
                assert!(out.contains(&e.relative_path), "{format} is missing {}", e.relative_path);
            }
        }
    }
}

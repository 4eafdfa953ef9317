use crate::chunking::plan_chunks;
use crate::config::ExportOptions;
use crate::context::{Chunk, ExportMetadata, FileEntry, FormattedOutput, SecretFinding};
use crate::error::{AppError, Result};
use crate::filter::{FilterChain, IgnoreRules, SkipReason};
use crate::gather::{collect_files, relative_path};
use crate::git::{GitInfoProvider, RepositoryReader};
use crate::output_formats::{self, heavy_rule};
use crate::provider::{FileHandle, Handle, looks_binary};
use crate::secrets::{self, CATEGORY_PII};
use crate::transform;
use chrono::Utc;
use log;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Progress reporting and cooperative cancellation for a run.
pub trait ProgressSink: Sync {
    fn set_text(&self, text: &str);
    fn set_fraction(&self, fraction: f64);
    /// Returns [`AppError::Cancelled`] once the caller asked to stop.
    fn check_cancelled(&self) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_text(&self, _text: &str) {}
    fn set_fraction(&self, _fraction: f64) {}
    fn check_cancelled(&self) -> Result<()> {
        Ok(())
    }
}

/// Forwards progress to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_text(&self, text: &str) {
        log::info!("{}", text);
    }
    fn set_fraction(&self, fraction: f64) {
        log::trace!("Progress: {:.0}%", fraction * 100.0);
    }
    fn check_cancelled(&self) -> Result<()> {
        Ok(())
    }
}

/// Cancellation flag that can be flipped from another thread (e.g. a Ctrl-C handler).
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CancelFlag {
    fn set_text(&self, text: &str) {
        log::debug!("{}", text);
    }
    fn set_fraction(&self, _fraction: f64) {}
    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}

enum FileOutcome {
    Processed {
        entry: FileEntry,
        findings: Vec<SecretFinding>,
    },
    Skipped,
}

/// Files that survived filtering, with their findings.
#[derive(Debug, Default)]
pub struct ProcessedFiles {
    pub entries: Vec<FileEntry>,
    pub findings: Vec<SecretFinding>,
    pub skipped: usize,
}

/// Runs collection, filtering, per-file processing, chunking and rendering.
pub struct ExportPipeline<'a> {
    options: &'a ExportOptions,
    project_root: PathBuf,
    git: Box<dyn GitInfoProvider + 'a>,
    ignore_rules: Option<IgnoreRules>,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(options: &'a ExportOptions, project_root: &Path) -> Self {
        Self {
            options,
            project_root: project_root.to_path_buf(),
            git: Box::new(RepositoryReader),
            ignore_rules: None,
        }
    }

    pub fn with_git_provider(mut self, provider: impl GitInfoProvider + 'a) -> Self {
        self.git = Box::new(provider);
        self
    }

    /// Uses the given rules instead of the `.gitignore` files among the collected handles.
    pub fn with_ignore_rules(mut self, rules: IgnoreRules) -> Self {
        self.ignore_rules = Some(rules);
        self
    }

    /// Collects, filters and transforms the selection without rendering it.
    pub fn process(
        &mut self,
        selection: &[Handle],
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedFiles> {
        progress.set_text("Collecting files...");
        progress.check_cancelled()?;
        let candidates = collect_files(selection);

        let mut filters = FilterChain::new(self.options, &self.project_root);
        if filters.respects_ignore_rules() {
            let rules = self
                .ignore_rules
                .take()
                .unwrap_or_else(|| IgnoreRules::from_handles(&self.project_root, &candidates));
            filters = filters.with_ignore_rules(rules);
        }

        progress.set_text(&format!("Processing {} files...", candidates.len()));
        let outcomes = self.process_all(&candidates, &filters, progress)?;

        let mut processed = ProcessedFiles::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Processed { entry, findings } => {
                    processed.entries.push(entry);
                    processed.findings.extend(findings);
                }
                FileOutcome::Skipped => processed.skipped += 1,
            }
        }
        progress.check_cancelled()?;
        Ok(processed)
    }

    pub fn run(mut self, selection: &[Handle], progress: &dyn ProgressSink) -> Result<FormattedOutput> {
        let options = self.options;
        let ProcessedFiles {
            entries,
            findings,
            skipped,
        } = self.process(selection, progress)?;

        let mut metadata = ExportMetadata::from_entries(&entries, skipped);
        metadata.project_name = Some(options.get_effective_project_name(&self.project_root));
        if options.include_timestamp {
            metadata.timestamp = Some(Utc::now());
        }
        if options.include_git_info {
            let git = self.git.git_info(&self.project_root);
            metadata.git_branch = git.branch;
            metadata.git_commit = git.commit;
            metadata.git_author = git.author;
        }
        metadata.pii_found = findings
            .iter()
            .filter(|f| f.secret.category == CATEGORY_PII)
            .count();
        metadata.secrets_found = findings.len() - metadata.pii_found;
        log::info!(
            "Processed {} files ({} skipped), ~{} tokens.",
            metadata.files_processed,
            metadata.files_skipped,
            metadata.estimated_tokens
        );

        progress.set_text("Rendering output...");
        let needs_chunking =
            options.enable_chunking && metadata.estimated_tokens > options.max_tokens;
        let (content, chunks) = if needs_chunking {
            let ordered: Vec<FileEntry> =
                output_formats::sort_entries(&entries, options.sort_files)
                    .into_iter()
                    .cloned()
                    .collect();
            let chunks = plan_chunks(
                ordered,
                options.chunk_strategy,
                options.max_tokens,
                options.files_per_chunk,
            )?;
            let content = render_chunks(&chunks, options, &metadata)?;
            (content, chunks.iter().map(Chunk::summary).collect())
        } else {
            (
                output_formats::render(&entries, options, &metadata)?,
                Vec::new(),
            )
        };
        progress.set_fraction(1.0);

        Ok(FormattedOutput {
            content,
            metadata,
            chunks,
            findings,
        })
    }

    fn process_all(
        &self,
        candidates: &[Handle],
        filters: &FilterChain,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<FileOutcome>> {
        let total = candidates.len().max(1) as f64;
        let done = AtomicUsize::new(0);
        let process = |handle: &Handle| -> Result<FileOutcome> {
            progress.check_cancelled()?;
            let outcome = self.process_file(handle.as_ref(), filters);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.set_fraction(finished as f64 / total);
            Ok(outcome)
        };

        if self.options.concurrent_processing && candidates.len() > 1 {
            let workers = self.options.max_concurrent_tasks.max(1);
            log::debug!("Processing files on {} worker threads", workers);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| AppError::Config(format!("Failed to start worker pool: {}", e)))?;
            pool.install(|| candidates.par_iter().map(process).collect())
        } else {
            candidates.iter().map(process).collect()
        }
    }

    fn process_file(&self, handle: &dyn FileHandle, filters: &FilterChain) -> FileOutcome {
        let path = handle.path();
        match self.read_and_transform(handle, filters) {
            Ok((entry, findings)) => {
                log::trace!("Included {}", path.display());
                FileOutcome::Processed { entry, findings }
            }
            Err(SkipReason::Unreadable(err)) => {
                log::warn!("Skipping unreadable file {}: {}", path.display(), err);
                FileOutcome::Skipped
            }
            Err(reason) => {
                log::trace!("Skipping {}: {}", path.display(), reason);
                FileOutcome::Skipped
            }
        }
    }

    fn read_and_transform(
        &self,
        handle: &dyn FileHandle,
        filters: &FilterChain,
    ) -> std::result::Result<(FileEntry, Vec<SecretFinding>), SkipReason> {
        let options = self.options;
        filters.check(handle)?;

        let bytes = handle
            .read_bytes()
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        // The file may have changed since it was listed.
        filters.check_size(bytes.len() as u64)?;
        if looks_binary(&bytes) {
            return Err(SkipReason::Binary);
        }
        let raw = String::from_utf8_lossy(&bytes);
        filters.check_line_count(raw.lines().count())?;

        let rel = relative_path(handle.path(), &self.project_root);
        let language = transform::detect_language(handle.path());

        let mut detected = Vec::new();
        if options.detect_secrets {
            detected.extend(secrets::detect(&raw));
        }
        if options.warn_pii {
            detected.extend(secrets::detect_pii(&raw));
        }
        let findings = detected
            .into_iter()
            .map(|secret| SecretFinding {
                path: rel.clone(),
                secret,
            })
            .collect();

        let content = transform::transform(&raw, options, language);
        let entry = FileEntry::new(
            rel,
            handle.path().to_path_buf(),
            language,
            content,
            bytes.len() as u64,
        )
        .with_modified(handle.modified());
        Ok((entry, findings))
    }
}

/// Entry point: process `selection` with `options` relative to `project_root`.
pub fn process_files(
    selection: &[Handle],
    options: &ExportOptions,
    project_root: &Path,
    progress: &dyn ProgressSink,
) -> Result<FormattedOutput> {
    ExportPipeline::new(options, project_root).run(selection, progress)
}

fn render_chunks(
    chunks: &[Chunk],
    options: &ExportOptions,
    metadata: &ExportMetadata,
) -> Result<String> {
    let heavy = heavy_rule();
    let mut out = format!(
        "{}\nMULTI-CHUNK EXPORT: {} chunks\n{}\n\n",
        heavy,
        chunks.len(),
        heavy
    );
    for chunk in chunks {
        if chunk.index > 0 {
            out.push_str(&heavy);
            out.push_str("\n\n");
        }
        out.push_str(&chunk_header(chunk));
        out.push_str("\n\n");
        out.push_str(&output_formats::render(&chunk.files, options, metadata)?);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn chunk_header(chunk: &Chunk) -> String {
    format!(
        "CHUNK {}/{} ({} files, ~{} tokens)",
        chunk.index + 1,
        chunk.total,
        chunk.files.len(),
        chunk.estimated_tokens
    )
}

use crate::config::ExportOptions;
use crate::gather::relative_path;
use crate::provider::{FileHandle, Handle};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use regex::Regex;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const IGNORE_FILENAME: &str = ".gitignore";

/// Why a candidate file did not make it into the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotIncluded,
    Excluded,
    Ignored,
    RegexMismatch,
    Size(u64),
    ModifiedBefore,
    LineCount(usize),
    Binary,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotIncluded => write!(f, "no include pattern matched"),
            SkipReason::Excluded => write!(f, "matched an exclude pattern"),
            SkipReason::Ignored => write!(f, "ignored by {}", IGNORE_FILENAME),
            SkipReason::RegexMismatch => write!(f, "path does not match regex filter"),
            SkipReason::Size(bytes) => write!(f, "size {} bytes outside allowed range", bytes),
            SkipReason::ModifiedBefore => write!(f, "not modified after cutoff"),
            SkipReason::LineCount(lines) => write!(f, "{} lines outside allowed range", lines),
            SkipReason::Binary => write!(f, "binary content"),
            SkipReason::Unreadable(err) => write!(f, "unreadable: {}", err),
        }
    }
}

/// Gitignore rules keyed by the directory holding each ignore file.
///
/// A path is judged only by the nearest ignore file between its directory and
/// the project root.
pub struct IgnoreRules {
    root: PathBuf,
    by_dir: HashMap<PathBuf, Gitignore>,
}

impl IgnoreRules {
    pub fn empty(project_root: &Path) -> Self {
        Self {
            root: project_root.to_path_buf(),
            by_dir: HashMap::new(),
        }
    }

    /// Picks the `.gitignore` files out of `candidates` and reads them through
    /// their handles, so any [`FileHandle`] provider works.
    pub fn from_handles(project_root: &Path, candidates: &[Handle]) -> Self {
        let mut rules = Self::empty(project_root);
        for handle in candidates {
            let path = handle.path();
            if handle.is_directory() || path.file_name() != Some(OsStr::new(IGNORE_FILENAME)) {
                continue;
            }
            let Some(dir) = path.parent().filter(|d| d.starts_with(project_root)) else {
                continue;
            };
            match handle.read_bytes() {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    log::debug!("Using ignore rules from {}", path.display());
                    rules
                        .by_dir
                        .insert(dir.to_path_buf(), build_gitignore(dir, text.lines()));
                }
                Err(e) => log::warn!("Problem reading {}: {}", path.display(), e),
            }
        }
        rules
    }

    /// Rules given as `.gitignore` lines, anchored at `project_root`.
    pub fn from_lines<S: AsRef<str>>(project_root: &Path, lines: &[S]) -> Self {
        let mut rules = Self::empty(project_root);
        rules.by_dir.insert(
            project_root.to_path_buf(),
            build_gitignore(project_root, lines.iter().map(AsRef::as_ref)),
        );
        rules
    }

    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        match self.nearest_for(&absolute) {
            Some(rules) => rules.matched_path_or_any_parents(&absolute, false).is_ignore(),
            None => false,
        }
    }

    fn nearest_for(&self, path: &Path) -> Option<&Gitignore> {
        path.ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root))
            .find_map(|dir| self.by_dir.get(dir))
    }
}

fn build_gitignore<'l>(dir: &Path, lines: impl Iterator<Item = &'l str>) -> Gitignore {
    let mut builder = GitignoreBuilder::new(dir);
    for line in lines {
        if let Err(e) = builder.add_line(None, line) {
            log::warn!("Skipping invalid ignore rule '{}': {}", line, e);
        }
    }
    builder.build().unwrap_or_else(|e| {
        log::warn!("Failed to build ignore rules for {}: {}", dir.display(), e);
        Gitignore::empty()
    })
}

/// Per-file accept/reject decisions, evaluated in a fixed order.
///
/// Glob, ignore, regex, size, modified-after and binary checks run before any
/// content is read ([`FilterChain::check`]). The line-count check needs the
/// content and is applied by the caller afterwards ([`FilterChain::check_line_count`]).
pub struct FilterChain {
    project_root: PathBuf,
    include_set: GlobSet,
    has_includes: bool,
    exclude_set: GlobSet,
    respect_ignore: bool,
    ignore: IgnoreRules,
    regex: Option<Regex>,
    min_bytes: u64,
    max_bytes: u64,
    modified_after: Option<SystemTime>,
    min_lines: usize,
    max_lines: usize,
}

impl FilterChain {
    pub fn new(options: &ExportOptions, project_root: &Path) -> Self {
        log::trace!("Building filter chain...");
        Self {
            project_root: project_root.to_path_buf(),
            include_set: build_glob_set(&options.include_globs),
            has_includes: !options.include_globs.is_empty(),
            exclude_set: build_glob_set(&options.exclude_globs),
            respect_ignore: options.respect_gitignore,
            ignore: IgnoreRules::empty(project_root),
            regex: build_regex_filter(options),
            min_bytes: options.min_file_size_bytes,
            max_bytes: options.effective_max_bytes(),
            modified_after: options.include_only_modified_after.map(SystemTime::from),
            min_lines: options.min_line_count,
            max_lines: options.max_line_count.unwrap_or(usize::MAX),
        }
    }

    /// Installs ignore rules. They are only consulted when the options respect them.
    pub fn with_ignore_rules(mut self, rules: IgnoreRules) -> Self {
        self.ignore = rules;
        self
    }

    pub fn respects_ignore_rules(&self) -> bool {
        self.respect_ignore
    }

    pub fn accepts(&self, handle: &dyn FileHandle) -> bool {
        self.check(handle).is_ok()
    }

    pub fn check(&self, handle: &dyn FileHandle) -> Result<(), SkipReason> {
        let rel = relative_path(handle.path(), &self.project_root);

        self.check_globs(&rel)?;
        if self.respect_ignore && self.ignore.should_ignore(handle.path()) {
            return Err(SkipReason::Ignored);
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(&rel) {
                return Err(SkipReason::RegexMismatch);
            }
        }
        self.check_size(handle.size())?;
        if let Some(cutoff) = self.modified_after {
            match handle.modified() {
                Some(modified) if modified >= cutoff => {}
                _ => return Err(SkipReason::ModifiedBefore),
            }
        }
        if handle.is_binary() {
            return Err(SkipReason::Binary);
        }
        Ok(())
    }

    pub fn check_globs(&self, relative_path: &str) -> Result<(), SkipReason> {
        if matches_self_or_ancestor(&self.exclude_set, relative_path) {
            return Err(SkipReason::Excluded);
        }
        if self.has_includes && !matches_self_or_ancestor(&self.include_set, relative_path) {
            return Err(SkipReason::NotIncluded);
        }
        Ok(())
    }

    pub fn check_size(&self, bytes: u64) -> Result<(), SkipReason> {
        if bytes < self.min_bytes || bytes > self.max_bytes {
            return Err(SkipReason::Size(bytes));
        }
        Ok(())
    }

    pub fn check_line_count(&self, lines: usize) -> Result<(), SkipReason> {
        if lines < self.min_lines || lines > self.max_lines {
            return Err(SkipReason::LineCount(lines));
        }
        Ok(())
    }
}

fn matches_self_or_ancestor(set: &GlobSet, relative_path: &str) -> bool {
    if set.is_empty() {
        return false;
    }
    if set.is_match(relative_path) {
        return true;
    }
    let mut rest = relative_path;
    while let Some((dir, _)) = rest.rsplit_once('/') {
        if set.is_match(dir) {
            return true;
        }
        rest = dir;
    }
    false
}

/// Compiles glob patterns, dropping malformed ones. A trailing `/` means "everything below".
pub fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.is_empty() {
            continue;
        }
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                log::warn!("Skipping invalid glob pattern \"{}\": {}", pattern_str, e);
            }
        }
    }
    builder.build().unwrap_or_else(|e| {
        log::warn!("Error building glob set, glob filter disabled: {}", e);
        GlobSet::empty()
    })
}

fn build_regex_filter(options: &ExportOptions) -> Option<Regex> {
    if !options.use_regex_filtering || options.regex_pattern.trim().is_empty() {
        return None;
    }
    match Regex::new(&options.regex_pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::warn!(
                "Invalid regex filter '{}', filter skipped: {}",
                options.regex_pattern,
                e
            );
            None
        }
    }
}

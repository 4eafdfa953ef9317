use crate::provider::Handle;
use indexmap::IndexMap;
use log;
use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Expands a selection of files and directories into a flat list of leaf files.
///
/// Directories are expanded breadth-first through a work queue. Files are keyed
/// by path, so overlapping selections (a directory plus a file inside it) yield
/// each file once, in first-seen order. A directory that cannot be listed
/// contributes no children.
pub fn collect_files(selection: &[Handle]) -> Vec<Handle> {
    log::debug!("Collecting files from {} selected entries...", selection.len());
    let mut queue: VecDeque<Handle> = selection.iter().cloned().collect();
    let mut visited_dirs: HashSet<PathBuf> = HashSet::new();
    let mut files: IndexMap<PathBuf, Handle> = IndexMap::new();

    while let Some(handle) = queue.pop_front() {
        if handle.is_directory() {
            if !visited_dirs.insert(handle.path().to_path_buf()) {
                continue;
            }
            match handle.children() {
                Ok(children) => {
                    log::trace!(
                        "Expanded {} ({} children)",
                        handle.path().display(),
                        children.len()
                    );
                    queue.extend(children);
                }
                Err(e) => {
                    log::warn!("Could not list directory {}: {}", handle.path().display(), e);
                }
            }
        } else {
            files
                .entry(handle.path().to_path_buf())
                .or_insert_with(|| handle.clone());
        }
    }

    log::info!("Collected {} candidate files.", files.len());
    files.into_values().collect()
}

/// Path relative to the project root, `/`-separated. Falls back to the path itself.
pub fn relative_path(path: &Path, project_root: &Path) -> String {
    let relative = path
        .strip_prefix(project_root)
        .map(Path::to_path_buf)
        .ok()
        .or_else(|| pathdiff::diff_paths(path, project_root))
        .unwrap_or_else(|| path.to_path_buf());
    normalize_separators(&relative)
}

pub fn normalize_separators(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent directory of a `/`-separated relative path, `""` for top-level files.
pub fn parent_dir(relative_path: &str) -> &str {
    relative_path
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("")
}

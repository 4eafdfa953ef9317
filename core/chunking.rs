use crate::config::ChunkStrategy;
use crate::context::{Chunk, FileEntry};
use crate::error::{AppError, Result};
use indexmap::IndexMap;
use log;

pub const NO_EXTENSION_KEY: &str = "(no extension)";

/// Partitions `files` into ordered, disjoint chunks. Files are never split;
/// each file lands in exactly one chunk and keeps its relative order.
pub fn plan_chunks(
    files: Vec<FileEntry>,
    strategy: ChunkStrategy,
    max_tokens: usize,
    files_per_chunk: usize,
) -> Result<Vec<Chunk>> {
    if max_tokens == 0 {
        return Err(AppError::Chunking(
            "Token budget must be greater than 0".to_string(),
        ));
    }
    if files_per_chunk == 0 {
        return Err(AppError::Chunking(
            "Files per chunk must be greater than 0".to_string(),
        ));
    }
    log::debug!(
        "Planning chunks for {} files with strategy {} (budget {} tokens)",
        files.len(),
        strategy,
        max_tokens
    );

    let groups = match strategy {
        ChunkStrategy::BySize => split_by_size(files, max_tokens),
        ChunkStrategy::ByFileCount => split_by_file_count(files, files_per_chunk),
        ChunkStrategy::ByDirectory => group_by_key(files, |f| f.parent_dir().to_string()),
        ChunkStrategy::ByFileType => group_by_key(files, |f| {
            let ext = f.extension();
            if ext.is_empty() {
                NO_EXTENSION_KEY.to_string()
            } else {
                ext
            }
        }),
        ChunkStrategy::Smart => split_smart(files, max_tokens),
    };

    let total = groups.len();
    log::info!("Split export into {} chunks.", total);
    Ok(groups
        .into_iter()
        .enumerate()
        .map(|(index, files)| {
            let mut chunk = Chunk::new(files);
            chunk.index = index;
            chunk.total = total;
            chunk
        })
        .collect())
}

fn split_by_size(files: Vec<FileEntry>, max_tokens: usize) -> Vec<Vec<FileEntry>> {
    let mut chunks: Vec<Vec<FileEntry>> = Vec::new();
    let mut current: Vec<FileEntry> = Vec::new();
    let mut current_tokens: usize = 0;

    for file in files {
        let file_tokens = file.estimated_tokens;

        if file_tokens > max_tokens {
            log::trace!(
                "File {} (~{} tokens) exceeds budget ({}), putting in its own chunk.",
                file.relative_path,
                file_tokens,
                max_tokens
            );
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunks.push(vec![file]);
            continue;
        }

        if !current.is_empty() && current_tokens.saturating_add(file_tokens) > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens = current_tokens.saturating_add(file_tokens);
        current.push(file);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_by_file_count(files: Vec<FileEntry>, files_per_chunk: usize) -> Vec<Vec<FileEntry>> {
    let mut chunks: Vec<Vec<FileEntry>> = Vec::new();
    for file in files {
        match chunks.last_mut() {
            Some(window) if window.len() < files_per_chunk => window.push(file),
            _ => chunks.push(vec![file]),
        }
    }
    chunks
}

/// One group per distinct key, in order of first appearance.
fn group_by_key<F>(files: Vec<FileEntry>, key: F) -> Vec<Vec<FileEntry>>
where
    F: Fn(&FileEntry) -> String,
{
    let mut groups: IndexMap<String, Vec<FileEntry>> = IndexMap::new();
    for file in files {
        groups.entry(key(&file)).or_default().push(file);
    }
    groups.into_values().collect()
}

/// Seeds a chunk with the next unassigned file, then pulls in later files
/// from the same directory while the budget allows.
fn split_smart(files: Vec<FileEntry>, max_tokens: usize) -> Vec<Vec<FileEntry>> {
    let mut slots: Vec<Option<FileEntry>> = files.into_iter().map(Some).collect();
    let mut chunks: Vec<Vec<FileEntry>> = Vec::new();

    for seed_index in 0..slots.len() {
        let Some(seed) = slots[seed_index].take() else {
            continue;
        };
        let mut chunk_tokens = seed.estimated_tokens;
        let directory = seed.parent_dir().to_string();
        let mut chunk = vec![seed];

        if chunk_tokens <= max_tokens {
            for slot in slots.iter_mut().skip(seed_index + 1) {
                let fits = slot.as_ref().is_some_and(|candidate| {
                    candidate.parent_dir() == directory
                        && chunk_tokens.saturating_add(candidate.estimated_tokens) <= max_tokens
                });
                if fits {
                    if let Some(sibling) = slot.take() {
                        chunk_tokens = chunk_tokens.saturating_add(sibling.estimated_tokens);
                        chunk.push(sibling);
                    }
                }
            }
        }
        chunks.push(chunk);
    }
    chunks
}

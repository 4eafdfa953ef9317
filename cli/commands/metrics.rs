use crate::cli_args::MetricsArgs;
use crate::output::{print_json, print_metrics_table};
use crate::{apply_filter_overrides, load_options_for_command, resolve_selection};
use anyhow::{Context, Result};
use log;
use serde::Serialize;
use tiktoken_rs::{CoreBPE, cl100k_base};
use xexport_core::output_formats::human_size;
use xexport_core::tokens::context_window_fit;
use xexport_core::{ExportPipeline, FileEntry, LogProgress};

#[derive(Debug, Serialize)]
pub struct ProjectMetrics {
    pub total_files: usize,
    pub skipped_files: usize,
    pub total_lines: usize,
    pub total_bytes: u64,
    pub total_bytes_readable: String,
    pub estimated_tokens: usize,
    pub cl100k_tokens: usize,
    pub context_window: &'static str,
    pub files_details: Vec<FileMetrics>,
}

#[derive(Debug, Serialize)]
pub struct FileMetrics {
    pub path: String,
    pub language: &'static str,
    pub lines: usize,
    pub bytes: u64,
    pub bytes_readable: String,
    pub estimated_tokens: usize,
    pub cl100k_tokens: usize,
}

pub fn handle_metrics_command(args: MetricsArgs, quiet: bool) -> Result<()> {
    let (project_root, selection) = resolve_selection(&args.project_config, &args.paths)?;
    let mut options = load_options_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration for metrics command")?;
    apply_filter_overrides(&mut options, &args.filters)?;

    log::debug!("Processing files for metrics...");
    let processed = ExportPipeline::new(&options, &project_root)
        .process(&selection, &LogProgress)
        .context("Failed to process files for metrics calculation")?;

    if processed.entries.is_empty() && !quiet && !args.json {
        println!("No files found to calculate metrics.");
        return Ok(());
    }

    let bpe = cl100k_base().map_err(|e| anyhow::anyhow!("Failed to load cl100k tokenizer: {}", e))?;
    let metrics = calculate_metrics(&processed.entries, processed.skipped, &bpe);
    log::debug!("Metrics calculation complete.");

    if args.json {
        print_json(&metrics)
    } else {
        print_metrics_table(&metrics);
        Ok(())
    }
}

fn calculate_metrics(entries: &[FileEntry], skipped: usize, bpe: &CoreBPE) -> ProjectMetrics {
    let mut files_details: Vec<FileMetrics> = entries
        .iter()
        .map(|entry| FileMetrics {
            path: entry.relative_path.clone(),
            language: entry.language,
            lines: entry.line_count,
            bytes: entry.byte_size,
            bytes_readable: human_size(entry.byte_size),
            estimated_tokens: entry.estimated_tokens,
            cl100k_tokens: bpe.encode_ordinary(&entry.content).len(),
        })
        .collect();
    files_details.sort_by(|a, b| a.path.cmp(&b.path));

    let total_bytes = files_details.iter().map(|f| f.bytes).sum();
    let estimated_tokens = files_details.iter().map(|f| f.estimated_tokens).sum();
    ProjectMetrics {
        total_files: files_details.len(),
        skipped_files: skipped,
        total_lines: files_details.iter().map(|f| f.lines).sum(),
        total_bytes,
        total_bytes_readable: human_size(total_bytes),
        estimated_tokens,
        cl100k_tokens: files_details.iter().map(|f| f.cl100k_tokens).sum(),
        context_window: context_window_fit(estimated_tokens),
        files_details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry::new(
            path.to_string(),
            PathBuf::from(path),
            "rust",
            content.to_string(),
            content.len() as u64,
        )
    }

    #[test]
    fn totals_sum_per_file_values_sorted_by_path() {
        let bpe = cl100k_base().unwrap();
        let entries = vec![
            entry("src/z.rs", "fn z() {}\n"),
            entry("src/a.rs", "fn a() {}\nfn b() {}\n"),
        ];
        let metrics = calculate_metrics(&entries, 3, &bpe);
        assert_eq!(metrics.total_files, 2);
        assert_eq!(metrics.skipped_files, 3);
        assert_eq!(metrics.total_lines, 3);
        assert_eq!(metrics.total_bytes, 30);
        assert_eq!(metrics.files_details[0].path, "src/a.rs");
        assert!(metrics.cl100k_tokens > 0);
        assert_eq!(metrics.context_window, "GPT-3.5 (8K)");
    }
}

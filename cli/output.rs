use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use xexport_core::output_formats::human_size;
use xexport_core::secrets::CATEGORY_PII;
use xexport_core::{FormattedOutput, SecretFinding, Severity};

use crate::commands::metrics::ProjectMetrics;

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize JSON")?;
    write_to_stdout(&content)
}

/// Asks before replacing `path`. Refuses outright in quiet mode.
pub fn confirm_overwrite(path: &Path, quiet: bool) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if quiet {
        anyhow::bail!(
            "Target file '{}' exists. Overwrite prevented in quiet mode.",
            path.display()
        );
    }
    print!(
        "{} File already exists at '{}'. Overwrite? [{}/{}] ",
        "⚠️".yellow(),
        path.display().to_string().cyan(),
        "y".green(),
        "N".red()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .context("Failed to read user input")?;
    if response.trim().eq_ignore_ascii_case("y") {
        Ok(true)
    } else {
        println!("Save cancelled.");
        Ok(false)
    }
}

/// Run summary and warnings, on stderr so stdout stays clean for the export itself.
pub fn print_export_summary(output: &FormattedOutput) {
    let meta = &output.metadata;
    eprintln!(
        "{} Exported {} files ({}, ~{} tokens, fits {}).",
        "✅".green(),
        meta.files_processed.to_string().cyan(),
        human_size(meta.total_bytes).cyan(),
        meta.estimated_tokens.to_string().cyan(),
        meta.context_window().blue()
    );
    if output.was_chunked() {
        eprintln!(
            "{} Split into {} chunks:",
            "📦".blue(),
            output.chunks.len().to_string().cyan()
        );
        for chunk in &output.chunks {
            eprintln!(
                "   {}/{}: {} files, ~{} tokens",
                chunk.index + 1,
                chunk.total,
                chunk.paths.len(),
                chunk.estimated_tokens
            );
        }
    }
    if meta.files_skipped > 0 {
        eprintln!(
            "{} {} files were skipped by filters or could not be read (use -vv for details).",
            "⚠️".yellow(),
            meta.files_skipped.to_string().yellow()
        );
    }
    if meta.secrets_found > 0 {
        eprintln!(
            "{} {} potential secrets detected{}. Run `xexport secrets` for the list.",
            "⚠️".yellow(),
            meta.secrets_found.to_string().red().bold(),
            if output.findings.iter().any(|f| f.secret.severity == Severity::High) {
                " (including HIGH severity)"
            } else {
                ""
            }
        );
    }
    if meta.pii_found > 0 {
        eprintln!(
            "{} {} possible personal data matches (not masked).",
            "⚠️".yellow(),
            meta.pii_found.to_string().yellow()
        );
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::DarkGrey,
    }
}

pub fn print_findings_table(findings: &[SecretFinding]) {
    if findings.is_empty() {
        println!("{} No secrets or personal data found.", "✅".green());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Line").fg(Color::Green),
        Cell::new("Category").fg(Color::Green),
        Cell::new("Type").fg(Color::Green),
        Cell::new("Severity").fg(Color::Green),
        Cell::new("Match").fg(Color::Green),
    ]);
    for finding in findings {
        let secret = &finding.secret;
        table.add_row(vec![
            Cell::new(&finding.path).fg(Color::Cyan),
            Cell::new(secret.line).set_alignment(CellAlignment::Right),
            Cell::new(secret.category),
            Cell::new(secret.kind),
            Cell::new(secret.severity).fg(severity_color(secret.severity)),
            Cell::new(&secret.matched).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");

    let pii = findings
        .iter()
        .filter(|f| f.secret.category == CATEGORY_PII)
        .count();
    println!(
        "{} secrets, {} personal data matches.",
        (findings.len() - pii).to_string().red().bold(),
        pii.to_string().yellow()
    );
}

pub fn print_metrics_table(metrics: &ProjectMetrics) {
    println!();
    println!("{}", " Project Metrics Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Total Files:".green(),
        metrics.total_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Skipped Files:".green(),
        metrics.skipped_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Lines:".green(),
        metrics.total_lines.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Size:".green(),
        metrics.total_bytes_readable.cyan()
    );
    println!(
        "{:<20} {}",
        "Est. Tokens:".green(),
        metrics.estimated_tokens.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "cl100k Tokens:".green(),
        metrics.cl100k_tokens.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Context Window:".green(),
        metrics.context_window.cyan()
    );

    if metrics.files_details.is_empty() {
        println!("\n{}", "(No files included in metrics)".yellow());
    } else {
        println!("\n{}", " File Details ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Language").fg(Color::Green),
            Cell::new("Lines").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
            Cell::new("Est. Tokens").fg(Color::Green),
            Cell::new("cl100k").fg(Color::Green),
        ]);
        for file in &metrics.files_details {
            table.add_row(vec![
                Cell::new(&file.path).fg(Color::Cyan),
                Cell::new(file.language),
                Cell::new(file.lines).set_alignment(CellAlignment::Right),
                Cell::new(&file.bytes_readable)
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
                Cell::new(file.estimated_tokens).set_alignment(CellAlignment::Right),
                Cell::new(file.cl100k_tokens).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }
    println!();
}

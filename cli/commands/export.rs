use crate::cli_args::ExportArgs;
use crate::output;
use crate::{
    apply_chunk_overrides, apply_content_overrides, apply_filter_overrides,
    apply_render_overrides, load_options_for_command, resolve_selection,
};
use anyhow::{Context, Result};
use colored::Colorize;
use log;
use std::path::{Path, PathBuf};
use xexport_core::config::DEFAULT_CONFIG_DIR;
use xexport_core::{ExportOptions, ExportPipeline, LogProgress};

const SAVE_FILE_STEM: &str = "export";

pub fn handle_export_command(args: ExportArgs, quiet: bool) -> Result<()> {
    let (project_root, selection) = resolve_selection(&args.project_config, &args.paths)?;

    let mut options = load_options_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration")?;
    apply_filter_overrides(&mut options, &args.filters)?;
    apply_content_overrides(&mut options, &args.content);
    apply_render_overrides(&mut options, &args.render)?;
    apply_chunk_overrides(&mut options, &args.chunking)?;
    if args.scheduling.sequential {
        options.concurrent_processing = false;
    }
    if let Some(jobs) = args.scheduling.jobs {
        options.max_concurrent_tasks = jobs;
    }
    log::debug!("Effective options: {:?}", options);

    let result = ExportPipeline::new(&options, &project_root)
        .run(&selection, &LogProgress)
        .context("Export failed")?;

    let target = match (&args.output, args.save) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(save_path(&project_root, &options)),
        (None, false) => None,
    };

    match target {
        Some(path) => {
            output::write_to_file(&path, &result.content)?;
            if !quiet {
                println!(
                    "{} Export saved to: {}",
                    "✅".green(),
                    path.display().to_string().blue()
                );
            }
        }
        None => output::write_to_stdout(&result.content)?,
    }

    if !quiet {
        output::print_export_summary(&result);
    }
    Ok(())
}

fn save_path(project_root: &Path, options: &ExportOptions) -> PathBuf {
    project_root.join(DEFAULT_CONFIG_DIR).join(format!(
        "{}.{}",
        SAVE_FILE_STEM,
        options.output_format.extension()
    ))
}

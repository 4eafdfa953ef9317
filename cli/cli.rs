mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use byte_unit::Byte;
use chrono::{TimeDelta, Utc};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::{Path, PathBuf};
use std::process;

use cli_args::{ChunkOpts, Cli, Commands, ContentOpts, FilterOpts, ProjectConfigOpts, RenderOpts};
use xexport_core::config::{DEFAULT_CONFIG_DIR, parse_pattern_list};
use xexport_core::{AppError, ExportOptions, Handle, LocalFile};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) | Some(AppError::TomlParse(_)) => 1,
        Some(AppError::Io(_))
        | Some(AppError::FileRead { .. })
        | Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::Chunking(_)) => 3,
        Some(AppError::InvalidArgument(_))
        | Some(AppError::Glob(_))
        | Some(AppError::Regex(_)) => 5,
        Some(AppError::JsonSerialize(_))
        | Some(AppError::TomlSerialize(_))
        | Some(AppError::XmlWrite(_)) => 6,
        Some(AppError::Cancelled) => 130,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Export(args) => {
                log::debug!("Executing 'export' command...");
                commands::export::handle_export_command(args, quiet)?;
            }
            Commands::Metrics(args) => {
                log::debug!("Executing 'metrics' command...");
                commands::metrics::handle_metrics_command(args, quiet)?;
            }
            Commands::Secrets(args) => {
                log::debug!("Executing 'secrets' command...");
                commands::secrets::handle_secrets_command(args)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                commands::config::handle_config_command(&args, quiet)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

/// Loads the TOML file (if any) for the project and applies the project-level flags.
pub fn load_options_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
) -> Result<ExportOptions> {
    let config_path = ExportOptions::resolve_config_path(
        project_root,
        project_opts.config.as_deref(),
        project_opts.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let mut options = match &config_path {
        Some(path) => ExportOptions::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ExportOptions::default(),
    };

    if let Some(name) = &project_opts.project_name {
        options.project_name = Some(name.clone());
    }
    Ok(options)
}

pub fn apply_filter_overrides(options: &mut ExportOptions, filters: &FilterOpts) -> Result<()> {
    log::trace!("Applying filter overrides: {:?}", filters);
    if !filters.include.is_empty() {
        options.include_globs = filters.include.iter().flat_map(|p| parse_pattern_list(p)).collect();
    }
    options
        .exclude_globs
        .extend(filters.exclude.iter().flat_map(|p| parse_pattern_list(p)));
    if filters.disable_gitignore {
        options.respect_gitignore = false;
    }
    if filters.enable_gitignore {
        options.respect_gitignore = true;
    }
    if let Some(pattern) = &filters.regex {
        options.use_regex_filtering = true;
        options.regex_pattern = pattern.clone();
    }
    if let Some(size) = &filters.max_file_size {
        let bytes = parse_size(size)?;
        // The KB cap still applies in the filter, so raise it along with the byte limit.
        options.max_file_size_bytes = Some(bytes);
        options.max_file_size_kb = bytes.div_ceil(1024);
    }
    if let Some(size) = &filters.min_file_size {
        options.min_file_size_bytes = parse_size(size)?;
    }
    if let Some(window) = &filters.modified_within {
        let elapsed = parse_duration::parse(window).map_err(|e| {
            AppError::InvalidArgument(format!("Invalid duration '{}': {}", window, e))
        })?;
        let delta = TimeDelta::from_std(elapsed).map_err(|e| {
            AppError::InvalidArgument(format!("Duration '{}' out of range: {}", window, e))
        })?;
        let cutoff = Utc::now().checked_sub_signed(delta).ok_or_else(|| {
            AppError::InvalidArgument(format!("Duration '{}' reaches before the epoch", window))
        })?;
        options.include_only_modified_after = Some(cutoff);
    }
    if let Some(min) = filters.min_lines {
        options.min_line_count = min;
    }
    if let Some(max) = filters.max_lines {
        options.max_line_count = Some(max);
    }
    exclude_tool_dir(options);
    Ok(())
}

/// Keeps saved exports and the config dir out of later runs.
fn exclude_tool_dir(options: &mut ExportOptions) {
    let pattern = format!("**/{}/", DEFAULT_CONFIG_DIR);
    if !options.exclude_globs.contains(&pattern) {
        options.exclude_globs.push(pattern);
    }
}

pub fn apply_content_overrides(options: &mut ExportOptions, content: &ContentOpts) {
    options.include_line_numbers |= content.line_numbers;
    options.strip_comments |= content.strip_comments;
    options.strip_whitespace |= content.strip_whitespace;
    options.extract_todos |= content.extract_todos;
    options.extract_doc_comments |= content.extract_docs;
    if content.keep_blank_lines {
        options.collapse_blank_lines = false;
    }
    if content.no_secret_detection {
        options.detect_secrets = false;
    }
    if content.no_masking {
        options.mask_secrets = false;
    }
    if content.no_pii {
        options.warn_pii = false;
    }
}

pub fn apply_render_overrides(options: &mut ExportOptions, render: &RenderOpts) -> Result<()> {
    if let Some(format) = &render.format {
        options.output_format = format.parse()?;
    }
    if let Some(path_format) = &render.path_format {
        options.path_format = path_format.parse()?;
    }
    if let Some(order) = &render.sort {
        options.sort_files = order.parse()?;
    }
    options.include_table_of_contents |= render.toc;
    options.include_git_info |= render.git_info;
    if render.no_metadata {
        options.include_metadata = false;
    }
    if render.no_statistics {
        options.include_statistics = false;
    }
    if render.no_timestamp {
        options.include_timestamp = false;
    }
    if render.no_grouping {
        options.group_by_directory = false;
    }
    Ok(())
}

pub fn apply_chunk_overrides(options: &mut ExportOptions, chunking: &ChunkOpts) -> Result<()> {
    if chunking.enable_chunking {
        options.enable_chunking = true;
    }
    if chunking.disable_chunking {
        options.enable_chunking = false;
    }
    if let Some(max_tokens) = chunking.max_tokens {
        options.max_tokens = max_tokens;
    }
    if let Some(strategy) = &chunking.chunk_strategy {
        options.chunk_strategy = strategy.parse()?;
    }
    if let Some(files) = chunking.files_per_chunk {
        options.files_per_chunk = files;
    }
    Ok(())
}

fn parse_size(raw: &str) -> Result<u64> {
    let bytes = raw
        .parse::<Byte>()
        .map_err(|e| AppError::InvalidArgument(format!("Invalid size '{}': {}", raw, e)))?;
    Ok(bytes.as_u64())
}

/// Resolves the project root and turns CLI paths into handles (the root itself when none given).
pub fn resolve_selection(
    project_opts: &ProjectConfigOpts,
    paths: &[PathBuf],
) -> Result<(PathBuf, Vec<Handle>)> {
    let project_root = ExportOptions::determine_project_root(project_opts.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let targets: Vec<PathBuf> = if paths.is_empty() {
        vec![project_root.clone()]
    } else {
        paths
            .iter()
            .map(|p| {
                p.canonicalize()
                    .with_context(|| format!("Cannot access '{}'", p.display()))
            })
            .collect::<Result<_>>()?
    };

    let selection = targets
        .into_iter()
        .map(|path| {
            LocalFile::handle(&path).map_err(|source| {
                anyhow::Error::new(AppError::FileRead {
                    path: path.clone(),
                    source,
                })
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((project_root, selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xexport_core::{ChunkStrategy, FilterChain, OutputFormat, SkipReason};

    #[test]
    fn filter_overrides_parse_sizes_and_durations() {
        let mut options = ExportOptions::default();
        let filters = FilterOpts {
            include: vec!["src/**, *.toml".into()],
            exclude: vec!["*.lock".into()],
            disable_gitignore: true,
            max_file_size: Some("1KiB".into()),
            modified_within: Some("1h".into()),
            max_lines: Some(200),
            ..Default::default()
        };
        apply_filter_overrides(&mut options, &filters).unwrap();
        assert_eq!(options.include_globs, vec!["src/**", "*.toml"]);
        assert_eq!(options.exclude_globs, vec!["*.lock", "**/.xexport/"]);
        assert!(!options.respect_gitignore);
        assert_eq!(options.max_file_size_bytes, Some(1024));
        assert_eq!(options.max_line_count, Some(200));
        let cutoff = options.include_only_modified_after.unwrap();
        let age = Utc::now() - cutoff;
        assert!(age >= TimeDelta::minutes(59) && age <= TimeDelta::minutes(61));
    }

    #[test]
    fn saved_exports_are_not_collected_again() {
        let mut options = ExportOptions::default();
        apply_filter_overrides(&mut options, &FilterOpts::default()).unwrap();
        apply_filter_overrides(&mut options, &FilterOpts::default()).unwrap();
        assert_eq!(
            options.exclude_globs.iter().filter(|g| g.contains(".xexport")).count(),
            1
        );

        let filters = FilterChain::new(&options, Path::new("/proj"));
        assert_eq!(
            filters.check_globs(".xexport/export.md"),
            Err(SkipReason::Excluded)
        );
        assert_eq!(
            filters.check_globs("sub/.xexport/xexport.toml"),
            Err(SkipReason::Excluded)
        );
        assert!(filters.check_globs("src/main.rs").is_ok());
    }

    #[test]
    fn max_file_size_flag_can_raise_the_default_cap() {
        let mut options = ExportOptions::default();
        let filters = FilterOpts {
            max_file_size: Some("5MiB".into()),
            ..Default::default()
        };
        apply_filter_overrides(&mut options, &filters).unwrap();
        assert_eq!(options.effective_max_bytes(), 5 * 1024 * 1024);

        let filters = FilterOpts {
            max_file_size: Some("1500B".into()),
            ..Default::default()
        };
        apply_filter_overrides(&mut options, &filters).unwrap();
        assert_eq!(options.max_file_size_kb, 2);
        assert_eq!(options.effective_max_bytes(), 1500);
    }

    #[test]
    fn bad_size_maps_to_invalid_argument_exit_code() {
        let mut options = ExportOptions::default();
        let filters = FilterOpts {
            max_file_size: Some("lots".into()),
            ..Default::default()
        };
        let err = apply_filter_overrides(&mut options, &filters).unwrap_err();
        assert_eq!(exit_code_for(&err), 5);
    }

    #[test]
    fn render_and_chunk_overrides_parse_enums() {
        let mut options = ExportOptions::default();
        let render = RenderOpts {
            format: Some("markdown_claude".into()),
            no_timestamp: true,
            ..Default::default()
        };
        let chunking = ChunkOpts {
            enable_chunking: true,
            chunk_strategy: Some("smart".into()),
            max_tokens: Some(10),
            ..Default::default()
        };
        apply_render_overrides(&mut options, &render).unwrap();
        apply_chunk_overrides(&mut options, &chunking).unwrap();
        assert_eq!(options.output_format, OutputFormat::MarkdownClaude);
        assert!(!options.include_timestamp);
        assert!(options.enable_chunking);
        assert_eq!(options.chunk_strategy, ChunkStrategy::Smart);
        assert_eq!(options.max_tokens, 10);
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code_for(&AppError::Cancelled.into()), 130);
        assert_eq!(exit_code_for(&AppError::Chunking("x".into()).into()), 3);
        let wrapped = anyhow::Error::from(AppError::Config("bad".into())).context("loading");
        assert_eq!(exit_code_for(&wrapped), 1);
        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 1);
    }
}

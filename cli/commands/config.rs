use crate::cli_args::ConfigArgs;
use crate::load_options_for_command;
use crate::output::{confirm_overwrite, write_to_file, write_to_stdout};
use anyhow::{Context, Result};
use colored::*;
use log;
use xexport_core::ExportOptions;
use xexport_core::config::default_config_path;

pub fn handle_config_command(args: &ConfigArgs, quiet: bool) -> Result<()> {
    let project_root = ExportOptions::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root for config command")?;

    if args.save {
        let path = default_config_path(&project_root);
        if !confirm_overwrite(&path, quiet)? {
            return Ok(());
        }
        let content = ExportOptions::default()
            .to_toml_string()
            .context("Failed to serialize default configuration")?;
        write_to_file(&path, &content)?;
        log::info!("Default configuration written to {}", path.display());
        if !quiet {
            println!(
                "{} Default config saved to: {}",
                "✅".green(),
                path.display().to_string().blue()
            );
        }
        return Ok(());
    }

    let options = load_options_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration")?;
    let content = options
        .to_toml_string()
        .context("Failed to serialize effective configuration")?;
    write_to_stdout(&content)
}

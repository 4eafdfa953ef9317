use crate::cli_args::SecretsArgs;
use crate::output::{print_findings_table, print_json};
use crate::{apply_filter_overrides, load_options_for_command, resolve_selection};
use anyhow::{Context, Result};
use log;
use xexport_core::secrets::mask_value;
use xexport_core::{ExportPipeline, LogProgress, SecretFinding};

pub fn handle_secrets_command(args: SecretsArgs) -> Result<()> {
    let (project_root, selection) = resolve_selection(&args.project_config, &args.paths)?;
    let mut options = load_options_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration for secrets command")?;
    apply_filter_overrides(&mut options, &args.filters)?;
    // Detection only: nothing is rendered, so masking and transforms are irrelevant.
    options.detect_secrets = true;
    options.mask_secrets = false;
    options.warn_pii = !args.no_pii;

    let processed = ExportPipeline::new(&options, &project_root)
        .process(&selection, &LogProgress)
        .context("Failed to scan files")?;
    log::info!(
        "Scanned {} files ({} skipped), {} findings.",
        processed.entries.len(),
        processed.skipped,
        processed.findings.len()
    );

    let mut findings = processed.findings;
    sort_findings(&mut findings);
    for finding in &mut findings {
        finding.secret.matched = mask_value(&finding.secret.matched);
    }

    if args.json {
        print_json(&findings)
    } else {
        print_findings_table(&findings);
        Ok(())
    }
}

/// Most severe first, then by location.
fn sort_findings(findings: &mut [SecretFinding]) {
    findings.sort_by(|a, b| {
        a.secret
            .severity
            .cmp(&b.secret.severity)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.secret.line.cmp(&b.secret.line))
    });
}

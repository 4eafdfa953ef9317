use super::{RenderContext, RenderedFile, directory_label};
use crate::config::OutputFormat;

/// Header phrasing of the Markdown variants. The file layout is identical.
struct Flavor {
    title: &'static str,
    intro: Option<&'static str>,
    bold_file_labels: bool,
}

fn flavor(format: OutputFormat) -> Flavor {
    match format {
        OutputFormat::MarkdownClaude => Flavor {
            title: "Codebase Context",
            intro: Some(
                "The files below are the relevant parts of this codebase. Each file is \
                 shown in full inside a fenced block labelled with its path; refer to \
                 files by that path when answering.",
            ),
            bold_file_labels: false,
        },
        OutputFormat::MarkdownChatgpt => Flavor {
            title: "Project Source Files",
            intro: Some(
                "**Context:** the following source files are provided for analysis. \
                 **Instructions:** read every file before answering and cite file paths.",
            ),
            bold_file_labels: true,
        },
        OutputFormat::MarkdownGemini => Flavor {
            title: "Source Code Context",
            intro: Some(
                "This document contains source files from a single project. A summary \
                 comes first, followed by each file in its own code block.",
            ),
            bold_file_labels: false,
        },
        _ => Flavor {
            title: "Code Export",
            intro: None,
            bold_file_labels: false,
        },
    }
}

pub(super) fn render(ctx: &RenderContext) -> String {
    let flavor = flavor(ctx.options.output_format);
    let mut out = String::new();
    push_line!(out, "# {}: {}\n", flavor.title, ctx.project_name());
    if let Some(intro) = flavor.intro {
        push_line!(out, "{}\n", intro);
    }

    if ctx.options.include_metadata {
        out.push_str("## Metadata\n\n");
        for (label, value) in ctx.metadata_fields() {
            push_line!(out, "- **{}:** {}", label, value);
        }
        out.push('\n');
    }

    if ctx.options.include_statistics {
        let stats = ctx.statistics();
        out.push_str("## Statistics\n\n");
        push_line!(
            out,
            "{} files ({} skipped), {}, ~{} tokens ({})\n",
            stats.files, stats.skipped, stats.total_size, stats.estimated_tokens, stats.context_window
        );
        out.push_str("| Language | Files |\n|----------|-------|\n");
        for lang in &stats.languages {
            push_line!(out, "| {} | {} |", lang.language, lang.files);
        }
        out.push('\n');
    }

    if ctx.options.wants_table_of_contents() {
        out.push_str("## Table of Contents\n\n");
        for (i, file) in ctx.files().enumerate() {
            push_line!(out, "{}. [{}](#{})", i + 1, file.path, file.slug);
        }
        out.push('\n');
    }

    out.push_str("## Files\n\n");
    for group in &ctx.groups {
        if let Some(directory) = group.directory {
            push_line!(out, "### Directory: {}\n", directory_label(directory));
        }
        for file in &group.files {
            write_file(&mut out, file, &flavor);
        }
    }
    out
}

fn write_file(out: &mut String, file: &RenderedFile, flavor: &Flavor) {
    push_line!(out, "<a id=\"{}\"></a>", file.slug);
    if flavor.bold_file_labels {
        push_line!(out, "#### **File:** `{}`\n", file.path);
    } else {
        push_line!(out, "#### {}\n", file.path);
    }
    let fence = fence_for(&file.entry.content);
    push_line!(out, "{}{}", fence, file.entry.language);
    out.push_str(&file.entry.content);
    if !file.entry.content.ends_with('\n') {
        out.push('\n');
    }
    push_line!(out, "{}\n", fence);
}

/// A backtick fence longer than any backtick run inside `content`.
pub(super) fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{entry, sample_entries, sample_metadata};
    use super::super::render as render_any;
    use super::*;
    use crate::config::ExportOptions;

    fn render_with(options: ExportOptions) -> String {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        render_any(&entries, &options, &metadata).unwrap()
    }

    #[test]
    fn python_file_gets_python_fence() {
        let entries = vec![entry("a.py", "python", "import os\nprint(1)")];
        let metadata = sample_metadata(&entries);
        let out = render_any(&entries, &ExportOptions::default(), &metadata).unwrap();
        assert!(out.contains("```python\nimport os\nprint(1)\n```"));
    }

    #[test]
    fn fence_outgrows_backticks_in_content() {
        assert_eq!(fence_for("no ticks"), "```");
        assert_eq!(fence_for("```sh\nx\n```"), "````");
        assert_eq!(fence_for("`````"), "``````");
        let out = render_with(ExportOptions::default());
        assert!(out.contains("````markdown\n# Demo"));
    }

    #[test]
    fn toc_lists_anchors_in_order() {
        let out = render_with(ExportOptions {
            output_format: OutputFormat::MarkdownToc,
            ..Default::default()
        });
        assert!(out.contains(
            "## Table of Contents\n\n1. [README.md](#readme-md)\n2. [scripts/tricky.py](#scripts-tricky-py)\n3. [src/lib.rs](#src-lib-rs)\n4. [src/main.rs](#src-main-rs)\n"
        ));
        assert!(out.contains("<a id=\"src-main-rs\"></a>"));

        let plain = render_with(ExportOptions::default());
        assert!(!plain.contains("Table of Contents"));
    }

    #[test]
    fn metadata_and_grouping_blocks() {
        let out = render_with(ExportOptions::default());
        assert!(out.starts_with("# Code Export: demo\n"));
        assert!(out.contains("- **Files:** 4"));
        assert!(out.contains("- **Skipped:** 2"));
        assert!(out.contains("| rust | 2 |"));
        assert!(out.contains("### Directory: ./"));
        assert!(out.contains("### Directory: src/"));

        let bare = render_with(ExportOptions {
            include_metadata: false,
            include_statistics: false,
            group_by_directory: false,
            ..Default::default()
        });
        assert!(!bare.contains("## Metadata"));
        assert!(!bare.contains("## Statistics"));
        assert!(!bare.contains("### Directory"));
    }

    #[test]
    fn ai_variants_differ_only_in_framing() {
        let claude = render_with(ExportOptions {
            output_format: OutputFormat::MarkdownClaude,
            ..Default::default()
        });
        let chatgpt = render_with(ExportOptions {
            output_format: OutputFormat::MarkdownChatgpt,
            ..Default::default()
        });
        assert!(claude.starts_with("# Codebase Context: demo"));
        assert!(chatgpt.contains("#### **File:** `src/lib.rs`"));
        assert!(claude.contains("```rust\npub mod a;\n```"));
        assert!(chatgpt.contains("```rust\npub mod a;\n```"));
    }
}

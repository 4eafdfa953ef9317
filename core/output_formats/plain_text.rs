use super::{RenderContext, RenderedFile, directory_label, heavy_rule, light_rule};

pub(super) fn render(ctx: &RenderContext) -> String {
    let heavy = heavy_rule();
    let light = light_rule();
    let mut out = String::new();
    push_line!(out, "{}", heavy);
    push_line!(out, "CODE EXPORT: {}", ctx.project_name());
    push_line!(out, "{}\n", heavy);

    if ctx.options.include_metadata {
        for (label, value) in ctx.metadata_fields() {
            push_line!(out, "{}: {}", label, value);
        }
        out.push('\n');
    }

    if ctx.options.include_statistics {
        let stats = ctx.statistics();
        push_line!(out, "STATISTICS\n{}", light);
        push_line!(
            out,
            "{} files ({} skipped), {}, ~{} tokens ({})",
            stats.files, stats.skipped, stats.total_size, stats.estimated_tokens, stats.context_window
        );
        for lang in &stats.languages {
            push_line!(out, "{:<20} {:>6} files", lang.language, lang.files);
        }
        out.push('\n');
    }

    if ctx.options.include_table_of_contents {
        push_line!(out, "TABLE OF CONTENTS\n{}", light);
        for (i, file) in ctx.files().enumerate() {
            push_line!(out, "{:>4}. {}", i + 1, file.path);
        }
        out.push('\n');
    }

    for group in &ctx.groups {
        if let Some(directory) = group.directory {
            push_line!(out, "{}\nDIRECTORY: {}\n{}\n", heavy, directory_label(directory), heavy);
        }
        for file in &group.files {
            write_file(&mut out, file, &light);
        }
    }
    out
}

fn write_file(out: &mut String, file: &RenderedFile, rule: &str) {
    let entry = file.entry;
    push_line!(out, "{}", rule);
    push_line!(
        out,
        "FILE: {} ({}, {} lines, ~{} tokens)",
        file.path, entry.language, entry.line_count, entry.estimated_tokens
    );
    push_line!(out, "{}", rule);
    out.push_str(&entry.content);
    if !entry.content.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
}

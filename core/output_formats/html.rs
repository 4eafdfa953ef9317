use super::{RenderContext, RenderedFile, directory_label};
use quick_xml::escape::escape;

const STYLE: &str = "\
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 2rem auto; max-width: 1100px; color: #1f2328; background: #ffffff; }
h1 { border-bottom: 2px solid #d0d7de; padding-bottom: .3rem; }
h2.directory { margin-top: 2.5rem; color: #57606a; }
table { border-collapse: collapse; margin: 1rem 0; }
th, td { border: 1px solid #d0d7de; padding: .3rem .8rem; text-align: left; }
nav.toc ol { columns: 2; }
section.file { margin: 1.5rem 0; }
section.file h3 { font-family: ui-monospace, Menlo, Consolas, monospace; font-size: 1rem; background: #f6f8fa; padding: .4rem .8rem; margin: 0; border: 1px solid #d0d7de; border-bottom: none; }
section.file .info { color: #57606a; font-weight: normal; font-size: .85rem; }
pre { margin: 0; padding: .8rem; overflow-x: auto; background: #f6f8fa; border: 1px solid #d0d7de; }
code { font-family: ui-monospace, Menlo, Consolas, monospace; font-size: .85rem; }
";

pub(super) fn render(ctx: &RenderContext) -> String {
    let title = format!("Code Export: {}", ctx.project_name());
    let mut out = String::new();
    push_line!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
    push_line!(out, "<meta charset=\"utf-8\">");
    push_line!(out, "<title>{}</title>", escape(&title));
    push_line!(out, "<style>\n{}</style>\n</head>\n<body>", STYLE);
    push_line!(out, "<h1>{}</h1>", escape(&title));

    if ctx.options.include_metadata {
        out.push_str("<section class=\"metadata\">\n<table>\n");
        for (label, value) in ctx.metadata_fields() {
            push_line!(out, "<tr><th>{}</th><td>{}</td></tr>", label, escape(&value));
        }
        out.push_str("</table>\n</section>\n");
    }

    if ctx.options.include_statistics {
        let stats = ctx.statistics();
        out.push_str("<section class=\"statistics\">\n<h2>Statistics</h2>\n");
        push_line!(
            out,
            "<p>{} files ({} skipped), {}, ~{} tokens ({})</p>",
            stats.files,
            stats.skipped,
            escape(&stats.total_size),
            stats.estimated_tokens,
            escape(stats.context_window)
        );
        out.push_str("<table>\n");
        out.push_str("<tr><th>Language</th><th>Files</th></tr>\n");
        for lang in &stats.languages {
            push_line!(out, "<tr><td>{}</td><td>{}</td></tr>", escape(&lang.language), lang.files);
        }
        out.push_str("</table>\n</section>\n");
    }

    if ctx.options.include_table_of_contents {
        out.push_str("<nav class=\"toc\">\n<h2>Table of Contents</h2>\n<ol>\n");
        for file in ctx.files() {
            push_line!(out, "<li><a href=\"#{}\">{}</a></li>", file.slug, escape(&file.path));
        }
        out.push_str("</ol>\n</nav>\n");
    }

    for group in &ctx.groups {
        if let Some(directory) = group.directory {
            push_line!(
                out,
                "<h2 class=\"directory\">{}</h2>",
                escape(&directory_label(directory))
            );
        }
        for file in &group.files {
            write_file(&mut out, file);
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn write_file(out: &mut String, file: &RenderedFile) {
    let entry = file.entry;
    push_line!(out, "<section class=\"file\" id=\"{}\">", file.slug);
    push_line!(
        out,
        "<h3>{} <span class=\"info\">{} &middot; {} lines</span></h3>",
        escape(&file.path),
        entry.language,
        entry.line_count
    );
    push_line!(
        out,
        "<pre><code class=\"language-{}\">{}</code></pre>",
        entry.language,
        escape(&entry.content)
    );
    out.push_str("</section>\n");
}

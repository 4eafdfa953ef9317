use super::{RenderContext, Statistics};
use crate::context::ExportMetadata;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct JsonExport<'a> {
    metadata: JsonMetadata<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<Statistics>,
    files: Vec<JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonMetadata<'a> {
    #[serde(flatten)]
    counters: &'a ExportMetadata,
    context_window: &'static str,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: &'a str,
    language: &'a str,
    lines: usize,
    size: u64,
    tokens: usize,
    content: &'a str,
}

pub(super) fn render(ctx: &RenderContext) -> Result<String> {
    let export = JsonExport {
        metadata: JsonMetadata {
            counters: ctx.metadata,
            context_window: ctx.metadata.context_window(),
        },
        statistics: ctx.options.include_statistics.then(|| ctx.statistics()),
        files: ctx
            .files()
            .map(|file| JsonFile {
                path: &file.path,
                language: file.entry.language,
                lines: file.entry.line_count,
                size: file.entry.byte_size,
                tokens: file.entry.estimated_tokens,
                content: &file.entry.content,
            })
            .collect(),
    };
    let mut json = serde_json::to_string_pretty(&export)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::super::render as render_any;
    use super::super::tests::{sample_entries, sample_metadata};
    use crate::config::{ExportOptions, OutputFormat};
    use serde_json::Value;

    #[test]
    fn output_parses_and_lists_each_path_once() {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        let options = ExportOptions {
            output_format: OutputFormat::Json,
            ..Default::default()
        };
        let json = render_any(&entries, &options, &metadata).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let files = value["files"].as_array().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f["path"].as_str().unwrap()).collect();
        assert_eq!(
            paths,
            vec!["README.md", "scripts/tricky.py", "src/lib.rs", "src/main.rs"]
        );
        for e in &entries {
            assert_eq!(json.matches(&format!("\"{}\"", e.relative_path)).count(), 1);
        }
        assert_eq!(files[1]["content"], entries[3].content.as_str());
        assert_eq!(value["metadata"]["project_name"], "demo");
        assert_eq!(value["metadata"]["files_skipped"], 2);
        assert_eq!(value["statistics"]["languages"][0]["language"], "rust");
    }
}

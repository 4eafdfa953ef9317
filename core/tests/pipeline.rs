use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};
use xexport_core::{
    AppError, CancelFlag, ChunkStrategy, ExportOptions, ExportPipeline, Handle, IgnoreRules,
    LocalFile, NoProgress, OutputFormat, process_files,
};

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn selection(root: &Path) -> Vec<Handle> {
    vec![LocalFile::handle(root).unwrap()]
}

fn quiet_options() -> ExportOptions {
    ExportOptions {
        include_timestamp: false,
        ..Default::default()
    }
}

#[test]
fn python_file_rendered_in_python_fence() {
    let dir = project(&[("a.py", "import os\nprint(1)")]);
    let out = process_files(&selection(dir.path()), &quiet_options(), dir.path(), &NoProgress)
        .unwrap();
    assert!(out.content.contains("```python\nimport os\nprint(1)\n```"));
    assert_eq!(out.metadata.files_processed, 1);
    assert_eq!(out.metadata.files_skipped, 0);
}

#[test]
fn api_key_is_masked_with_same_length() {
    let key = "abcd1234567890ABCDEFGH";
    let dir = project(&[("settings.env", &format!("API_KEY=\"{key}\"\n"))]);
    let out = process_files(&selection(dir.path()), &quiet_options(), dir.path(), &NoProgress)
        .unwrap();
    assert!(!out.content.contains(key));
    let masked = format!("{}{}", &key[..4], "*".repeat(key.len() - 4));
    assert!(out.content.contains(&format!("API_KEY=\"{masked}\"")));
    assert_eq!(out.metadata.secrets_found, 1);
}

#[test]
fn budget_splits_ten_files_into_four_four_two() {
    // One 48,000 character line estimates to 12,000 tokens.
    let body = "x".repeat(48_000);
    let files: Vec<(String, &str)> = (0..10).map(|i| (format!("part{i:02}.txt"), body.as_str())).collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), *c)).collect();
    let dir = project(&refs);

    let options = ExportOptions {
        enable_chunking: true,
        max_tokens: 50_000,
        chunk_strategy: ChunkStrategy::BySize,
        ..quiet_options()
    };
    let out = process_files(&selection(dir.path()), &options, dir.path(), &NoProgress).unwrap();
    let sizes: Vec<usize> = out.chunks.iter().map(|c| c.paths.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    assert!(out.chunks.iter().all(|c| c.estimated_tokens <= 50_000));
    assert!(out.content.contains("MULTI-CHUNK EXPORT: 3 chunks"));
    assert!(out.content.contains("CHUNK 3/3 (2 files, ~24000 tokens)"));
}

#[test]
fn gitignored_directory_respected_only_when_enabled() {
    let dir = project(&[
        (".gitignore", "build/\n"),
        ("build/out.txt", "generated\n"),
        ("src/main.rs", "fn main() {}\n"),
    ]);
    let respected = process_files(&selection(dir.path()), &quiet_options(), dir.path(), &NoProgress)
        .unwrap();
    assert!(!respected.content.contains("build/out.txt"));
    assert!(respected.content.contains("src/main.rs"));
    assert_eq!(respected.metadata.files_skipped, 1);

    let ignored = ExportOptions {
        respect_gitignore: false,
        ..quiet_options()
    };
    let out = process_files(&selection(dir.path()), &ignored, dir.path(), &NoProgress).unwrap();
    assert!(out.content.contains("build/out.txt"));
}

#[test]
fn nested_gitignore_is_nearest_match() {
    let dir = project(&[
        (".gitignore", "*.log\n"),
        ("app/.gitignore", "!keep.log\n"),
        ("app/keep.log", "kept\n"),
        ("app/src/run.log", "nested\n"),
        ("root.log", "dropped\n"),
    ]);
    let options = ExportOptions {
        include_globs: vec!["**/*.log".into()],
        ..quiet_options()
    };
    let out = process_files(&selection(dir.path()), &options, dir.path(), &NoProgress).unwrap();
    assert!(out.content.contains("app/keep.log"));
    assert!(out.content.contains("app/src/run.log"));
    assert!(!out.content.contains("root.log"));
}

#[test]
fn supplied_ignore_rules_replace_discovery() {
    let dir = project(&[("keep.txt", "k\n"), ("drop.txt", "d\n")]);
    let options = quiet_options();
    let out = ExportPipeline::new(&options, dir.path())
        .with_ignore_rules(IgnoreRules::from_lines(dir.path(), &["*.txt", "!keep.txt"]))
        .run(&selection(dir.path()), &NoProgress)
        .unwrap();
    assert!(out.content.contains("keep.txt"));
    assert!(!out.content.contains("drop.txt"));
}

#[test]
fn json_and_xml_outputs_parse_and_list_each_path_once() {
    let dir = project(&[
        ("src/lib.rs", "pub fn a() -> &'static str { \"<&>\" }\n"),
        ("src/cdata.xml", "<x><![CDATA[nested]]></x>\n"),
        ("README.md", "# Title\n"),
    ]);
    let paths = ["README.md", "src/cdata.xml", "src/lib.rs"];

    let json_options = ExportOptions {
        output_format: OutputFormat::Json,
        ..quiet_options()
    };
    let json = process_files(&selection(dir.path()), &json_options, dir.path(), &NoProgress)
        .unwrap()
        .content;
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let listed: Vec<&str> = value["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(listed, paths);
    for path in paths {
        assert_eq!(json.matches(&format!("\"{path}\"")).count(), 1);
    }

    let xml_options = ExportOptions {
        output_format: OutputFormat::Xml,
        ..quiet_options()
    };
    let xml = process_files(&selection(dir.path()), &xml_options, dir.path(), &NoProgress)
        .unwrap()
        .content;
    let mut reader = Reader::from_str(&xml);
    let mut file_paths = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"file" => {
                let attr = e.try_get_attribute("path").unwrap().unwrap();
                file_paths.push(attr.unescape_value().unwrap().into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    assert_eq!(file_paths, paths);
    for path in paths {
        assert_eq!(xml.matches(&format!("\"{path}\"")).count(), 1);
    }
}

#[test]
fn cancelled_run_yields_error() {
    let dir = project(&[("a.rs", "fn a() {}\n")]);
    let flag = CancelFlag::new();
    flag.cancel();
    let result = process_files(&selection(dir.path()), &quiet_options(), dir.path(), &flag);
    assert!(matches!(result, Err(AppError::Cancelled)));
}

#[test]
fn size_and_line_filters_count_as_skipped() {
    let dir = project(&[
        ("tiny.txt", "a"),
        ("big.txt", &"line\n".repeat(50)),
        ("ok.txt", "one\ntwo\nthree\n"),
    ]);
    let options = ExportOptions {
        min_file_size_bytes: 2,
        max_line_count: Some(10),
        ..quiet_options()
    };
    let out = process_files(&selection(dir.path()), &options, dir.path(), &NoProgress).unwrap();
    assert_eq!(out.metadata.files_processed, 1);
    assert_eq!(out.metadata.files_skipped, 2);
    assert!(out.content.contains("ok.txt"));
}

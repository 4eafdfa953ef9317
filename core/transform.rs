use crate::config::ExportOptions;
use crate::secrets;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const PLAIN_TEXT_LANGUAGE: &str = "text";

/// How comments look in a language; decides what `strip_comments` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//` line comments and `/* */` blocks.
    CFamily,
    /// `#` line comments.
    Script,
    None,
}

/// Maps a file to the language tag used for code fences and statistics.
pub fn detect_language(path: &Path) -> &'static str {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    // Exact file names first; these rarely carry a useful extension.
    match file_name.as_ref() {
        "Makefile" | "makefile" | "GNUmakefile" => return "makefile",
        "Dockerfile" | "Containerfile" => return "dockerfile",
        "CMakeLists.txt" => return "cmake",
        "Rakefile" | "Gemfile" => return "ruby",
        "Jenkinsfile" => return "groovy",
        _ => {}
    }
    if file_name.starts_with("Dockerfile.") {
        return "dockerfile";
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    language_for_extension(&extension).unwrap_or(PLAIN_TEXT_LANGUAGE)
}

fn language_for_extension(extension: &str) -> Option<&'static str> {
    let language = match extension {
        "rs" => "rust",
        "py" | "pyw" | "pyi" => "python",
        "js" | "cjs" | "mjs" => "javascript",
        "jsx" => "jsx",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" | "sc" => "scala",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "m" | "mm" => "objectivec",
        "dart" => "dart",
        "groovy" | "gradle" => "groovy",
        "php" => "php",
        "rb" | "rake" | "gemspec" => "ruby",
        "sh" | "bash" | "zsh" | "fish" => "bash",
        "ps1" | "psm1" => "powershell",
        "pl" | "pm" => "perl",
        "r" => "r",
        "lua" => "lua",
        "ex" | "exs" => "elixir",
        "erl" | "hrl" => "erlang",
        "hs" => "haskell",
        "clj" | "cljs" | "edn" => "clojure",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "less" => "less",
        "vue" => "vue",
        "svelte" => "svelte",
        "xml" | "xsd" | "svg" => "xml",
        "json" | "jsonc" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" | "cfg" | "conf" => "ini",
        "md" | "markdown" => "markdown",
        "org" => "org",
        "proto" => "protobuf",
        "graphql" | "gql" => "graphql",
        "tf" | "hcl" => "hcl",
        "cmake" => "cmake",
        "mk" => "makefile",
        "dockerfile" => "dockerfile",
        _ => return None,
    };
    Some(language)
}

pub fn comment_style(language: &str) -> CommentStyle {
    match language {
        "rust" | "javascript" | "jsx" | "typescript" | "tsx" | "java" | "kotlin" | "scala"
        | "go" | "c" | "cpp" | "csharp" | "swift" | "objectivec" | "dart" | "groovy" | "php"
        | "scss" | "less" | "protobuf" => CommentStyle::CFamily,
        "python" | "ruby" | "bash" | "powershell" | "perl" | "r" | "elixir" | "yaml" | "toml"
        | "ini" | "graphql" | "hcl" | "cmake" | "makefile" | "dockerfile" => CommentStyle::Script,
        _ => CommentStyle::None,
    }
}

/// Applies the enabled content rewrites in their fixed order:
/// masking, comment stripping, whitespace cleanup, TODO summary, doc-comment
/// summary and finally line numbers.
pub fn transform(raw: &str, options: &ExportOptions, language: &str) -> String {
    let mut content = raw.to_string();
    if options.detect_secrets && options.mask_secrets {
        content = secrets::mask(&content);
    }
    if options.strip_comments {
        content = strip_comments(&content, language);
    }
    if options.strip_whitespace {
        content = normalize_whitespace(&content, options.collapse_blank_lines);
    }
    if options.extract_todos {
        content = prepend_todo_summary(&content);
    }
    if options.extract_doc_comments {
        content = prepend_doc_comments(&content);
    }
    if options.include_line_numbers {
        content = number_lines(&content);
    }
    content
}

/// Removes comments while leaving string literals alone. Lines that held only
/// a comment are dropped; a leading shebang survives.
pub fn strip_comments(content: &str, language: &str) -> String {
    let style = comment_style(language);
    if style == CommentStyle::None {
        return content.to_string();
    }
    let (shebang, body) = match content.strip_prefix("#!") {
        Some(_) => match content.find('\n') {
            Some(end) => content.split_at(end + 1),
            None => (content, ""),
        },
        None => ("", content),
    };

    let mut stripper = CommentStripper::new(style, language != "rust");
    for c in body.chars() {
        stripper.push(c);
    }
    let mut stripped = shebang.to_string();
    stripped.push_str(&stripper.finish());
    stripped
}

#[derive(Clone, Copy, PartialEq)]
enum LexState {
    Code,
    Str(char),
    LineComment,
    BlockComment,
}

struct CommentStripper {
    style: CommentStyle,
    single_quote_strings: bool,
    state: LexState,
    escaped: bool,
    out: String,
    line: String,
    line_had_comment: bool,
    prev: Option<char>,
    pending: Option<char>,
}

impl CommentStripper {
    fn new(style: CommentStyle, single_quote_strings: bool) -> Self {
        Self {
            style,
            single_quote_strings,
            state: LexState::Code,
            escaped: false,
            out: String::new(),
            line: String::new(),
            line_had_comment: false,
            prev: None,
            pending: None,
        }
    }

    fn push(&mut self, c: char) {
        // `/` is held back one character to tell `//` and `/*` from division.
        if let Some(held) = self.pending.take() {
            match (held, c) {
                ('/', '/') => {
                    self.state = LexState::LineComment;
                    self.line_had_comment = true;
                    return;
                }
                ('/', '*') => {
                    self.state = LexState::BlockComment;
                    self.line_had_comment = true;
                    self.prev = None;
                    return;
                }
                _ => self.emit(held),
            }
        }

        if c == '\n' {
            if self.state == LexState::LineComment {
                self.state = LexState::Code;
            }
            if let LexState::Str(_) = self.state {
                self.state = LexState::Code;
                self.escaped = false;
            }
            self.end_line();
            self.prev = Some(c);
            return;
        }

        match self.state {
            LexState::LineComment => {}
            LexState::BlockComment => {
                if self.prev == Some('*') && c == '/' {
                    self.state = LexState::Code;
                    self.prev = None;
                    return;
                }
            }
            LexState::Str(quote) => {
                self.line.push(c);
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == quote {
                    self.state = LexState::Code;
                }
            }
            LexState::Code => match (self.style, c) {
                (CommentStyle::CFamily, '/') => {
                    self.pending = Some(c);
                    return;
                }
                (CommentStyle::Script, '#')
                    if self.prev.is_none_or(|p| p.is_whitespace() || p == ';') =>
                {
                    self.state = LexState::LineComment;
                    self.line_had_comment = true;
                }
                (_, '"') | (_, '`') => {
                    self.line.push(c);
                    self.state = LexState::Str(c);
                }
                (_, '\'') if self.single_quote_strings => {
                    self.line.push(c);
                    self.state = LexState::Str(c);
                }
                _ => self.line.push(c),
            },
        }
        self.prev = Some(c);
    }

    fn emit(&mut self, c: char) {
        self.line.push(c);
        self.prev = Some(c);
    }

    fn end_line(&mut self) {
        if self.line_had_comment {
            if !self.line.trim().is_empty() {
                self.out.push_str(self.line.trim_end());
                self.out.push('\n');
            }
        } else {
            self.out.push_str(&self.line);
            self.out.push('\n');
        }
        self.line.clear();
        self.line_had_comment = self.state == LexState::BlockComment;
    }

    fn finish(mut self) -> String {
        if let Some(held) = self.pending.take() {
            self.emit(held);
        }
        if !self.line.is_empty() || self.line_had_comment {
            self.end_line();
            // no trailing newline in the input
            if self.out.ends_with('\n') {
                self.out.pop();
            }
        }
        self.out
    }
}

/// Drops leading blank lines and trailing spaces; optionally squeezes blank-line runs.
pub fn normalize_whitespace(content: &str, collapse_blank_lines: bool) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in content.lines().map(str::trim_end) {
        let blank = line.is_empty();
        if blank && (lines.is_empty() || (collapse_blank_lines && previous_blank)) {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut normalized = lines.join("\n");
    if content.ends_with('\n') && !normalized.is_empty() {
        normalized.push('\n');
    }
    normalized
}

static TODO_MARKER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b(?:TODO|FIXME|XXX|HACK|NOTE)\b").ok());

static DOC_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)/\*\*.*?\*/").ok());

pub const TODO_HEADER: &str = "=== TODO SUMMARY ===";
pub const DOC_HEADER: &str = "=== DOCUMENTATION ===";

/// Collects `L<line>: <text>` for every TODO-style marker.
pub fn extract_todos(content: &str) -> Vec<String> {
    let Some(marker) = TODO_MARKER.as_ref() else {
        return Vec::new();
    };
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            marker
                .find(line)
                .map(|m| format!("L{}: {}", index + 1, line[m.start()..].trim_end()))
        })
        .collect()
}

pub fn extract_doc_comments(content: &str) -> Vec<String> {
    match DOC_BLOCK.as_ref() {
        Some(block) => block
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect(),
        None => Vec::new(),
    }
}

pub fn prepend_todo_summary(content: &str) -> String {
    prepend_block(TODO_HEADER, &extract_todos(content), content)
}

pub fn prepend_doc_comments(content: &str) -> String {
    prepend_block(DOC_HEADER, &extract_doc_comments(content), content)
}

fn prepend_block(header: &str, items: &[String], content: &str) -> String {
    if items.is_empty() {
        return content.to_string();
    }
    let mut block = String::with_capacity(content.len() + header.len() + 64);
    block.push_str(header);
    block.push('\n');
    for item in items {
        block.push_str(item);
        block.push('\n');
    }
    block.push('\n');
    block.push_str(content);
    block
}

pub fn number_lines(content: &str) -> String {
    let mut numbered = content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>4}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");
    if content.ends_with('\n') {
        numbered.push('\n');
    }
    numbered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_languages_by_extension_and_name() {
        assert_eq!(detect_language(Path::new("src/main.rs")), "rust");
        assert_eq!(detect_language(Path::new("a.py")), "python");
        assert_eq!(detect_language(Path::new("App.TSX")), "tsx");
        assert_eq!(detect_language(Path::new("build/Makefile")), "makefile");
        assert_eq!(detect_language(Path::new("Dockerfile.dev")), "dockerfile");
        assert_eq!(detect_language(Path::new("LICENSE")), PLAIN_TEXT_LANGUAGE);
    }

    #[test]
    fn strips_c_family_comments_but_not_strings() {
        let src = "// header\nlet url = \"http://x\"; // trailing\n/* block\n spans */let y = 2;\nlet z = a / b;\n";
        let stripped = strip_comments(src, "rust");
        assert_eq!(stripped, "let url = \"http://x\";\nlet y = 2;\nlet z = a / b;\n");
    }

    #[test]
    fn rust_lifetimes_do_not_open_strings() {
        let src = "fn f<'a>(x: &'a str) {} // note\n";
        assert_eq!(strip_comments(src, "rust"), "fn f<'a>(x: &'a str) {}\n");
    }

    #[test]
    fn strips_script_comments_and_keeps_shebang() {
        let src = "#!/usr/bin/env python\n# comment\nx = '#not'  # real\nprint(x)";
        assert_eq!(strip_comments(src, "python"), "#!/usr/bin/env python\nx = '#not'\nprint(x)");
    }

    #[test]
    fn unknown_languages_are_left_alone() {
        let src = "# title\n// not code";
        assert_eq!(strip_comments(src, "markdown"), src);
    }

    #[test]
    fn whitespace_normalization() {
        let src = "\n\nfn a() {}   \n\n\n\nfn b() {}\n\n";
        assert_eq!(normalize_whitespace(src, true), "fn a() {}\n\nfn b() {}\n");
        assert_eq!(normalize_whitespace(src, false), "fn a() {}\n\n\n\nfn b() {}\n");
    }

    #[test]
    fn todo_summary_is_prepended() {
        let src = "fn a() {}\n// TODO: handle errors\nlet x = 1; // FIXME later\n";
        let out = prepend_todo_summary(src);
        assert!(out.starts_with(
            "=== TODO SUMMARY ===\nL2: TODO: handle errors\nL3: FIXME later\n\nfn a() {}"
        ));
        assert_eq!(prepend_todo_summary("nothing here"), "nothing here");
    }

    #[test]
    fn doc_comments_are_prepended() {
        let src = "/** Adds numbers. */\nint add(int a, int b);\n/**\n * Subtracts.\n */\nint sub(int a, int b);\n";
        let docs = extract_doc_comments(src);
        assert_eq!(docs, vec!["/** Adds numbers. */", "/**\n * Subtracts.\n */"]);
        assert!(prepend_doc_comments(src).starts_with("=== DOCUMENTATION ===\n/** Adds numbers. */\n"));
    }

    #[test]
    fn line_numbers_are_right_aligned() {
        assert_eq!(number_lines("a\nb\n"), "   1: a\n   2: b\n");
    }

    #[test]
    fn stripping_runs_before_todo_extraction() {
        let options = ExportOptions {
            strip_comments: true,
            extract_todos: true,
            include_line_numbers: true,
            ..Default::default()
        };
        let out = transform("let a = 1; // TODO gone\nlet b = 2;\n", &options, "rust");
        assert_eq!(out, "   1: let a = 1;\n   2: let b = 2;\n");
    }

    #[test]
    fn default_options_only_mask_secrets() {
        let options = ExportOptions::default();
        let src = "import os\nprint(1)";
        assert_eq!(transform(src, &options, "python"), src);
        let masked = transform("token = \"abcdefghijklmnop1234\"", &options, "python");
        assert!(!masked.contains("abcdefghijklmnop1234"));
    }
}

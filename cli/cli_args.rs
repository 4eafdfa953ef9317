use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const FORMATS: [&str; 9] = [
    "markdown",
    "markdown_toc",
    "xml",
    "json",
    "plain_text",
    "html",
    "markdown_claude",
    "markdown_chatgpt",
    "markdown_gemini",
];

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the target project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Path or name of the TOML config file (default: .xexport/xexport.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,

    #[arg(
        long,
        help = "Specify the project name (overrides config/dir name).",
        value_name = "NAME",
        help_heading = "Project Setup"
    )]
    pub project_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(long = "include", value_name = "PATTERN", action = clap::ArgAction::Append, help = "Only export files matching this glob (repeatable).", help_heading = "Filtering")]
    pub include: Vec<String>,

    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append, help = "Skip files matching this glob (repeatable, wins over --include).", help_heading = "Filtering")]
    pub exclude: Vec<String>,

    #[arg(
        long,
        help = "Respect .gitignore files [default: enabled].",
        overrides_with = "disable_gitignore",
        help_heading = "Filtering"
    )]
    pub enable_gitignore: bool,
    #[arg(
        long,
        help = "Ignore .gitignore files.",
        overrides_with = "enable_gitignore",
        help_heading = "Filtering"
    )]
    pub disable_gitignore: bool,

    #[arg(
        long,
        value_name = "REGEX",
        help = "Only export files whose relative path matches this regex.",
        help_heading = "Filtering"
    )]
    pub regex: Option<String>,

    #[arg(
        long,
        value_name = "SIZE",
        help = "Skip files larger than this (e.g. '512KB', '2MiB').",
        help_heading = "Filtering"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long,
        value_name = "SIZE",
        help = "Skip files smaller than this (e.g. '10B').",
        help_heading = "Filtering"
    )]
    pub min_file_size: Option<String>,

    #[arg(
        long,
        value_name = "DURATION",
        help = "Only export files modified within this duration (e.g. '3d', '12h').",
        help_heading = "Filtering"
    )]
    pub modified_within: Option<String>,

    #[arg(
        long,
        value_name = "N",
        help = "Skip files with fewer lines.",
        help_heading = "Filtering"
    )]
    pub min_lines: Option<usize>,

    #[arg(
        long,
        value_name = "N",
        help = "Skip files with more lines.",
        help_heading = "Filtering"
    )]
    pub max_lines: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContentOpts {
    #[arg(long, help = "Prefix every line with its number.", help_heading = "Content")]
    pub line_numbers: bool,

    #[arg(long, help = "Remove comments (string-aware).", help_heading = "Content")]
    pub strip_comments: bool,

    #[arg(
        long,
        help = "Trim trailing whitespace from every line.",
        help_heading = "Content"
    )]
    pub strip_whitespace: bool,

    #[arg(
        long,
        help = "With --strip-whitespace, keep runs of blank lines instead of collapsing them.",
        help_heading = "Content"
    )]
    pub keep_blank_lines: bool,

    #[arg(
        long,
        help = "Prepend a summary of TODO/FIXME markers to each file.",
        help_heading = "Content"
    )]
    pub extract_todos: bool,

    #[arg(
        long,
        help = "Prepend extracted doc comments to each file.",
        help_heading = "Content"
    )]
    pub extract_docs: bool,

    #[arg(long, help = "Do not scan for secrets.", help_heading = "Content")]
    pub no_secret_detection: bool,

    #[arg(
        long,
        help = "Report secrets but leave them unmasked.",
        help_heading = "Content"
    )]
    pub no_masking: bool,

    #[arg(long, help = "Do not scan for personal data.", help_heading = "Content")]
    pub no_pii: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenderOpts {
    #[arg(short = 'f', long, help = "Set the output format.", value_name = "FORMAT", value_parser = FORMATS, help_heading = "Output Formatting")]
    pub format: Option<String>,

    #[arg(
        long,
        help = "Add a table of contents (markdown flavours and HTML).",
        help_heading = "Output Formatting"
    )]
    pub toc: bool,

    #[arg(long, help = "Omit the metadata block.", help_heading = "Output Formatting")]
    pub no_metadata: bool,

    #[arg(
        long,
        help = "Omit the statistics block.",
        help_heading = "Output Formatting"
    )]
    pub no_statistics: bool,

    #[arg(
        long,
        help = "Include branch, commit and author from .git.",
        help_heading = "Output Formatting"
    )]
    pub git_info: bool,

    #[arg(
        long,
        help = "Omit the generation timestamp.",
        help_heading = "Output Formatting"
    )]
    pub no_timestamp: bool,

    #[arg(long, value_name = "FORMAT", value_parser = ["relative", "absolute", "file_name"], help = "How file paths are displayed.", help_heading = "Output Formatting")]
    pub path_format: Option<String>,

    #[arg(
        long,
        help = "Do not group files under directory headings.",
        help_heading = "Output Formatting"
    )]
    pub no_grouping: bool,

    #[arg(long, value_name = "ORDER", value_parser = ["path_alphabetical", "name_alphabetical", "size_ascending", "size_descending", "modified_date", "extension"], help = "File ordering.", help_heading = "Output Formatting")]
    pub sort: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChunkOpts {
    #[arg(
        long,
        help = "Split the export when it exceeds --max-tokens.",
        overrides_with = "disable_chunking",
        help_heading = "Chunking"
    )]
    pub enable_chunking: bool,
    #[arg(
        long,
        help = "Always render a single document.",
        overrides_with = "enable_chunking",
        help_heading = "Chunking"
    )]
    pub disable_chunking: bool,

    #[arg(
        long,
        value_name = "TOKENS",
        help = "Token budget per chunk [default: 100000].",
        help_heading = "Chunking"
    )]
    pub max_tokens: Option<usize>,

    #[arg(long, value_name = "STRATEGY", value_parser = ["by_size", "by_file_count", "by_directory", "by_file_type", "smart"], help = "How files are grouped into chunks.", help_heading = "Chunking")]
    pub chunk_strategy: Option<String>,

    #[arg(
        long,
        value_name = "N",
        help = "Files per chunk for the by_file_count strategy.",
        help_heading = "Chunking"
    )]
    pub files_per_chunk: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SchedulingOpts {
    #[arg(
        long,
        help = "Process files one at a time.",
        help_heading = "Performance"
    )]
    pub sequential: bool,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Worker threads for concurrent processing [default: 8].",
        help_heading = "Performance"
    )]
    pub jobs: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(
    name = "xexport",
    author,
    version,
    about = "Export project source files as a single LLM-ready document.",
    long_about = "xexport collects project files, filters them (globs, .gitignore, size, age), \nmasks secrets, optionally strips comments, estimates tokens and renders \nMarkdown, XML, JSON, HTML or plain text, splitting large exports into chunks.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xexport export src/ -f markdown_claude -o context.md\n  xexport export --strip-comments --enable-chunking --max-tokens 50000\n  xexport metrics\n  xexport secrets",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "e",
        visible_alias = "x",
        about = "Export the selected files as one document."
    )]
    Export(ExportArgs),

    #[command(
        visible_alias = "m",
        about = "Show per-file lines, size and token estimates."
    )]
    Metrics(MetricsArgs),

    #[command(about = "Scan the selected files for secrets and personal data.")]
    Secrets(SecretsArgs),

    #[command(about = "Show or save the effective configuration.")]
    Config(ConfigArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(
        value_name = "PATHS",
        help = "Files or directories to export (default: project root)."
    )]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the export to FILE.",
        conflicts_with = "save",
        help_heading = "Output Control"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 's',
        long,
        help = "Save into .xexport/ under the project, named after the format.",
        help_heading = "Output Control"
    )]
    pub save: bool,

    #[clap(flatten)]
    pub render: RenderOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
    #[clap(flatten)]
    pub content: ContentOpts,
    #[clap(flatten)]
    pub chunking: ChunkOpts,
    #[clap(flatten)]
    pub scheduling: SchedulingOpts,
}

#[derive(Args, Debug, Clone)]
pub struct MetricsArgs {
    #[arg(value_name = "PATHS", help = "Files or directories to measure.")]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,

    #[arg(long, help = "Print metrics as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SecretsArgs {
    #[arg(value_name = "PATHS", help = "Files or directories to scan.")]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,

    #[arg(long, help = "Print findings as JSON.")]
    pub json: bool,

    #[arg(long, help = "Skip personal data detection.")]
    pub no_pii: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        long,
        help = "Save default config to .xexport/xexport.toml (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

pub mod chunking;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod gather;
pub mod git;
pub mod output_formats;
pub mod pipeline;
pub mod provider;
pub mod secrets;
pub mod tokens;
pub mod transform;

pub use chunking::plan_chunks;
pub use config::{ChunkStrategy, ExportOptions, OutputFormat, PathFormat, SortOrder};
pub use context::{
    Chunk, ChunkSummary, ExportMetadata, FileEntry, FormattedOutput, SecretFinding,
};
pub use error::{AppError, Result};
pub use filter::{FilterChain, IgnoreRules, SkipReason};
pub use gather::collect_files;
pub use git::{GitInfo, GitInfoProvider, RepositoryReader};
pub use output_formats::render;
pub use pipeline::{
    CancelFlag, ExportPipeline, LogProgress, NoProgress, ProcessedFiles, ProgressSink,
    process_files,
};
pub use provider::{FileHandle, Handle, LocalFile, MemoryFile};
pub use secrets::{DetectedSecret, Severity};

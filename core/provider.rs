//! File access capability used by the export pipeline.
//!
//! The pipeline never touches `std::fs` directly for candidate files; it asks a
//! [`FileHandle`] for everything it needs. [`LocalFile`] backs this with the
//! real disk, [`MemoryFile`] with an in-memory tree.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Bytes inspected by the NUL-byte binary heuristic.
pub const BINARY_SNIFF_LEN: usize = 8192;

pub type Handle = Arc<dyn FileHandle>;

pub trait FileHandle: Debug + Send + Sync {
    fn path(&self) -> &Path;
    fn is_directory(&self) -> bool;
    /// Direct children only; the collector does the recursion.
    fn children(&self) -> io::Result<Vec<Handle>>;
    fn read_bytes(&self) -> io::Result<Vec<u8>>;
    fn size(&self) -> u64;
    fn modified(&self) -> Option<SystemTime>;
    fn is_binary(&self) -> bool;
}

pub fn looks_binary(sample: &[u8]) -> bool {
    sample.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    is_dir: bool,
    size: u64,
    modified: Option<SystemTime>,
}

impl LocalFile {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path)?;
        Ok(Self {
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            path,
        })
    }

    pub fn handle(path: impl Into<PathBuf>) -> io::Result<Handle> {
        Ok(Arc::new(Self::open(path)?))
    }
}

impl FileHandle for LocalFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_directory(&self) -> bool {
        self.is_dir
    }

    fn children(&self) -> io::Result<Vec<Handle>> {
        if !self.is_dir {
            return Ok(Vec::new());
        }
        let mut children: Vec<Handle> = Vec::new();
        for entry in WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::other)?;
            match LocalFile::open(entry.path()) {
                Ok(child) => children.push(Arc::new(child)),
                Err(e) => log::warn!("Cannot stat {}: {}", entry.path().display(), e),
            }
        }
        Ok(children)
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    fn is_binary(&self) -> bool {
        if self.is_dir {
            return false;
        }
        let mut buffer = vec![0u8; BINARY_SNIFF_LEN.min(self.size as usize)];
        if buffer.is_empty() {
            return false;
        }
        match File::open(&self.path).and_then(|mut f| f.read(&mut buffer)) {
            Ok(read) => looks_binary(&buffer[..read]),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
enum MemoryNode {
    File(Vec<u8>),
    Dir(Vec<Arc<MemoryFile>>),
}

/// In-memory file tree.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    path: PathBuf,
    node: MemoryNode,
    modified: Option<SystemTime>,
    binary: bool,
}

impl MemoryFile {
    pub fn file(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            node: MemoryNode::File(content.into()),
            modified: Some(SystemTime::now()),
            binary: false,
        }
    }

    pub fn dir(path: impl Into<PathBuf>, children: Vec<MemoryFile>) -> Self {
        Self {
            path: path.into(),
            node: MemoryNode::Dir(children.into_iter().map(Arc::new).collect()),
            modified: Some(SystemTime::now()),
            binary: false,
        }
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    /// Marks the file as binary regardless of its content.
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Builds a directory tree rooted at `root` from `(relative path, content)` pairs.
    pub fn tree<P: AsRef<Path>, C: AsRef<[u8]>>(root: impl Into<PathBuf>, files: &[(P, C)]) -> Self {
        let root = root.into();
        let mut layout = DirLayout::default();
        for (rel, content) in files {
            layout.insert(rel.as_ref(), content.as_ref());
        }
        layout.build(root)
    }

    pub fn into_handle(self) -> Handle {
        Arc::new(self)
    }
}

#[derive(Default)]
struct DirLayout {
    dirs: BTreeMap<String, DirLayout>,
    files: BTreeMap<String, Vec<u8>>,
}

impl DirLayout {
    fn insert(&mut self, rel: &Path, content: &[u8]) {
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let Some((name, dirs)) = parts.split_last() else {
            return;
        };
        let mut level = self;
        for dir in dirs {
            level = level.dirs.entry(dir.clone()).or_default();
        }
        level.files.insert(name.clone(), content.to_vec());
    }

    fn build(self, path: PathBuf) -> MemoryFile {
        let mut children = Vec::new();
        for (name, sub) in self.dirs {
            children.push(sub.build(path.join(name)));
        }
        for (name, content) in self.files {
            children.push(MemoryFile::file(path.join(name), content));
        }
        MemoryFile::dir(path, children)
    }
}

impl FileHandle for MemoryFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_directory(&self) -> bool {
        matches!(self.node, MemoryNode::Dir(_))
    }

    fn children(&self) -> io::Result<Vec<Handle>> {
        match &self.node {
            MemoryNode::Dir(children) => Ok(children
                .iter()
                .map(|child| Arc::clone(child) as Handle)
                .collect()),
            MemoryNode::File(_) => Ok(Vec::new()),
        }
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match &self.node {
            MemoryNode::File(content) => Ok(content.clone()),
            MemoryNode::Dir(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", self.path.display()),
            )),
        }
    }

    fn size(&self) -> u64 {
        match &self.node {
            MemoryNode::File(content) => content.len() as u64,
            MemoryNode::Dir(_) => 0,
        }
    }

    fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    fn is_binary(&self) -> bool {
        match &self.node {
            MemoryNode::File(content) => self.binary || looks_binary(content),
            MemoryNode::Dir(_) => false,
        }
    }
}

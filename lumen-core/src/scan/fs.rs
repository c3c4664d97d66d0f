use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Minimal, async-capable filesystem abstraction used by the scanner.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Open a directory for iteration.
    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>>;

    /// Metadata with symlinks followed.
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;

    /// Metadata of the entry itself, without following a symlink.
    async fn symlink_metadata(&self, path: &Path) -> io::Result<FsMetadata>;
}

/// Lightweight metadata needed by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Async directory iterator (similar to tokio::fs::ReadDir).
#[async_trait]
pub trait ReadDirStream {
    /// Return next entry's path, or None when exhausted.
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>>;
}

/// Real filesystem implementation backed by tokio::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

fn convert(md: &std::fs::Metadata) -> FsMetadata {
    FsMetadata {
        is_dir: md.is_dir(),
        is_file: md.is_file(),
        is_symlink: md.file_type().is_symlink(),
        len: md.len(),
        modified: md.modified().ok(),
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>> {
        let rd = tokio::fs::read_dir(path).await?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        tokio::fs::metadata(path).await.map(|md| convert(&md))
    }

    async fn symlink_metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        tokio::fs::symlink_metadata(path).await.map(|md| convert(&md))
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.inner.next_entry().await?.map(|entry| entry.path()))
    }
}

/// In-memory filesystem for tests.
///
/// Clones share the same tree, so a test can keep a handle and mutate files
/// between scans. Paths are treated literally.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFs {
    nodes: Arc<RwLock<HashMap<PathBuf, Node>>>,
}

#[derive(Debug, Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    /// A directory whose listing fails with permission denied.
    Unreadable,
    File { len: u64, modified: Option<SystemTime> },
    Symlink { target: PathBuf },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&path) {
            return;
        }
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&self, path: P, len: u64) {
        self.add_file_modified(path, len, Some(SystemTime::UNIX_EPOCH));
    }

    pub fn add_file_modified<P: Into<PathBuf>>(
        &self,
        path: P,
        len: u64,
        modified: Option<SystemTime>,
    ) {
        let path = path.into();
        let mut nodes = self.nodes.write();
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::File { len, modified });
    }

    pub fn add_unreadable_dir<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.nodes.write();
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::Unreadable);
    }

    pub fn add_symlink<P: Into<PathBuf>, T: Into<PathBuf>>(&self, path: P, target: T) {
        let path = path.into();
        let mut nodes = self.nodes.write();
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(
            path,
            Node::Symlink {
                target: target.into(),
            },
        );
    }

    /// Remove a node (and anything below it) and unlink it from its parent.
    pub fn remove<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        nodes.retain(|p, _| !p.starts_with(path));
        if let Some(parent) = path.parent()
            && let Some(Node::Dir { children }) = nodes.get_mut(parent)
        {
            children.retain(|child| child != path);
        }
    }

    fn resolve(&self, path: &Path) -> io::Result<Node> {
        let nodes = self.nodes.read();
        let mut current = path.to_path_buf();
        // Bounded to catch symlink cycles.
        for _ in 0..16 {
            match nodes.get(&current) {
                Some(Node::Symlink { target }) => current = target.clone(),
                Some(node) => return Ok(node.clone()),
                None => return Err(not_found(path)),
            }
        }
        Err(io::Error::other(format!(
            "too many levels of symbolic links: {}",
            path.display()
        )))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn ensure_parent_link(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    if let Some(parent) = path.parent() {
        if !nodes.contains_key(parent) {
            nodes.insert(
                parent.to_path_buf(),
                Node::Dir {
                    children: Vec::new(),
                },
            );
            ensure_parent_link(nodes, parent);
        }
        if let Some(Node::Dir { children }) = nodes.get_mut(parent)
            && !children.iter().any(|p| p.as_path() == path)
        {
            children.push(path.to_path_buf());
        }
    }
}

fn node_metadata(node: &Node) -> FsMetadata {
    match node {
        Node::Dir { .. } | Node::Unreadable => FsMetadata {
            is_dir: true,
            is_file: false,
            is_symlink: false,
            len: 0,
            modified: None,
        },
        Node::File { len, modified } => FsMetadata {
            is_dir: false,
            is_file: true,
            is_symlink: false,
            len: *len,
            modified: *modified,
        },
        Node::Symlink { .. } => FsMetadata {
            is_dir: false,
            is_file: false,
            is_symlink: true,
            len: 0,
            modified: None,
        },
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>> {
        match self.resolve(path)? {
            Node::Dir { children } => Ok(Box::new(InMemReadDir {
                queue: children.into(),
            })),
            Node::Unreadable => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            )),
            _ => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", path.display()),
            )),
        }
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        self.resolve(path).map(|node| node_metadata(&node))
    }

    async fn symlink_metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        self.nodes
            .read()
            .get(path)
            .map(node_metadata)
            .ok_or_else(|| not_found(path))
    }
}

struct InMemReadDir {
    queue: VecDeque<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.queue.pop_front())
    }
}

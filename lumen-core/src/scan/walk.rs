use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_stream::stream;
use futures::Stream;
use thiserror::Error;

use super::fs::FileSystem;

/// A regular file found under a scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Failure to read one directory entry. The walk continues past it.
#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct WalkError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WalkError {
    fn new(path: PathBuf, source: io::Error) -> Self {
        Self { path, source }
    }
}

/// Recursively yield every regular file under `root`.
///
/// Symlinks to files are followed; symlinked directories are reported as
/// nothing and never descended into, which keeps link cycles out of the walk.
/// Unreadable directories and dangling links surface as `Err` items.
pub fn walk_files(
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
) -> impl Stream<Item = Result<WalkEntry, WalkError>> + Send + 'static {
    stream! {
        let root_md = match fs.metadata(&root).await {
            Ok(md) => md,
            Err(err) => {
                yield Err(WalkError::new(root.clone(), err));
                return;
            }
        };
        if root_md.is_file {
            yield Ok(WalkEntry { path: root.clone(), len: root_md.len, modified: root_md.modified });
            return;
        }

        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(WalkError::new(dir, err));
                    continue;
                }
            };

            loop {
                let path = match entries.next_entry().await {
                    Ok(Some(path)) => path,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(WalkError::new(dir.clone(), err));
                        break;
                    }
                };

                let md = match fs.symlink_metadata(&path).await {
                    Ok(md) => md,
                    Err(err) => {
                        yield Err(WalkError::new(path, err));
                        continue;
                    }
                };

                if md.is_symlink {
                    match fs.metadata(&path).await {
                        Ok(target) if target.is_file => {
                            yield Ok(WalkEntry { path, len: target.len, modified: target.modified });
                        }
                        Ok(_) => {}
                        Err(err) => {
                            yield Err(WalkError::new(path, err));
                        }
                    }
                } else if md.is_dir {
                    pending.push(path);
                } else if md.is_file {
                    yield Ok(WalkEntry { path, len: md.len, modified: md.modified });
                }
            }
        }
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lumen_core::scan::{FileSystem, InMemoryFs};
use lumen_core::{
    CatalogStore, InMemoryCatalog, KindClassifier, RescanJobPolicy, Scanner,
    ThumbnailError, ThumbnailGenerator, ThumbnailWorker, WorkerConfig,
};
use lumen_model::{Library, MediaKind};
use parking_lot::Mutex;

/// Generator that fails a configured number of times per source, then
/// writes a small placeholder image.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    failures: Mutex<HashMap<PathBuf, u32>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_times(&self, source: impl Into<PathBuf>, times: u32) {
        self.failures.lock().insert(source.into(), times);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        source: &Path,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<(), ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !kind.is_thumbnailable() {
            return Err(ThumbnailError::UnsupportedKind(kind));
        }
        {
            let mut failures = self.failures.lock();
            if let Some(left) = failures.get_mut(source)
                && *left > 0
            {
                *left -= 1;
                return Err(ThumbnailError::Io(io::Error::other("decoder exploded")));
            }
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"\xFF\xD8\xFF thumb").await?;
        Ok(())
    }
}

pub struct Harness {
    pub catalog: InMemoryCatalog,
    pub fs: InMemoryFs,
    pub library: Library,
}

impl Harness {
    pub async fn new(root: &str) -> Self {
        let catalog = InMemoryCatalog::new();
        let fs = InMemoryFs::new();
        fs.add_dir(root);
        let library = catalog
            .create_library("test", &[PathBuf::from(root)])
            .await
            .expect("create library");
        Self {
            catalog,
            fs,
            library,
        }
    }

    pub fn catalog(&self) -> Arc<dyn CatalogStore> {
        Arc::new(self.catalog.clone())
    }

    pub fn scanner(&self, classifier: KindClassifier, policy: RescanJobPolicy) -> Scanner {
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        Scanner::new(self.catalog(), fs, classifier).with_rescan_policy(policy)
    }

    pub fn default_scanner(&self) -> Scanner {
        self.scanner(KindClassifier::default(), RescanJobPolicy::Always)
    }

    pub fn worker(
        &self,
        generator: Arc<ScriptedGenerator>,
        thumb_dir: &Path,
    ) -> ThumbnailWorker {
        ThumbnailWorker::new(
            self.catalog(),
            generator,
            WorkerConfig {
                thumb_dir: thumb_dir.to_path_buf(),
                ..WorkerConfig::default()
            },
        )
    }
}

/// Keep successive scan watermarks strictly ordered.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

use std::collections::HashSet;
use std::sync::Arc;

use lumen_model::LibraryId;
use parking_lot::Mutex;

/// Libraries with a scan in flight.
///
/// Two overlapping scans of one library would compare against different
/// watermarks and could flag each other's files as missing, so a library
/// admits one scan at a time.
#[derive(Debug, Default, Clone)]
pub struct ScanRegistry {
    running: Arc<Mutex<HashSet<LibraryId>>>,
}

/// Releases the library's slot when dropped.
#[derive(Debug)]
pub struct ScanGuard {
    registry: ScanRegistry,
    library_id: LibraryId,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the library, or `None` if a scan is already running.
    pub fn try_begin(&self, library_id: LibraryId) -> Option<ScanGuard> {
        if self.running.lock().insert(library_id) {
            Some(ScanGuard {
                registry: self.clone(),
                library_id,
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, library_id: LibraryId) -> bool {
        self.running.lock().contains(&library_id)
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.registry.running.lock().remove(&self.library_id);
    }
}

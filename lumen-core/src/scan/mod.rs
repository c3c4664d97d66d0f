//! Filesystem scanning and reconciliation.

pub mod classify;
pub mod fs;
pub mod scanner;
pub mod settings;
pub mod walk;

pub use classify::KindClassifier;
pub use fs::{FileSystem, FsMetadata, InMemoryFs, ReadDirStream, RealFs};
pub use scanner::{RescanJobPolicy, ScanSummary, Scanner};
pub use settings::ScannerSettings;
pub use walk::{WalkEntry, WalkError, walk_files};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lumen_core::scan::RealFs;
use lumen_core::{CatalogStore, Scanner, StreamGateway};

use super::config::Config;
use super::scan_registry::ScanRegistry;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<dyn CatalogStore>,
    scanner: Scanner,
    gateway: StreamGateway,
    scans: ScanRegistry,
    config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("catalog", &self.catalog)
            .field("scanner", &self.scanner)
            .field("scans", &self.scans)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        scanner: Scanner,
        config: Arc<Config>,
    ) -> Self {
        Self {
            gateway: StreamGateway::new(Arc::clone(&catalog)),
            catalog,
            scanner,
            scans: ScanRegistry::new(),
            config,
        }
    }

    /// Wire a scanner over the real filesystem from configuration.
    pub fn from_config(catalog: Arc<dyn CatalogStore>, config: Arc<Config>) -> Self {
        let scanner = Scanner::new(
            Arc::clone(&catalog),
            Arc::new(RealFs),
            config.scanner.classifier(),
        )
        .with_rescan_policy(config.scanner.rescan_job_policy);
        Self::new(catalog, scanner, config)
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn gateway(&self) -> &StreamGateway {
        &self.gateway
    }

    pub fn scans(&self) -> &ScanRegistry {
        &self.scans
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scan_timeout(&self) -> Duration {
        self.config.scanner.timeout
    }
}

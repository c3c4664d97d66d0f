use thiserror::Error;

use super::models::Config;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("worker.batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("worker.max_attempts must be at least 1")]
    ZeroMaxAttempts,
    #[error("worker.poll_interval must be greater than zero")]
    ZeroPollInterval,
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let worker = &config.worker;

    if worker.batch_size == 0 {
        return Err(ConfigGuardRailError::ZeroBatchSize);
    }
    if worker.max_attempts == 0 {
        return Err(ConfigGuardRailError::ZeroMaxAttempts);
    }
    if worker.poll_interval.is_zero() {
        return Err(ConfigGuardRailError::ZeroPollInterval);
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "No database URL configured",
            "Set DATABASE_URL or database.url in lumen.toml",
        );
    }

    match worker.lock_timeout {
        None => warnings.push_with_hint(
            "Job lock reclaim is disabled",
            "Jobs locked by a crashed worker will never run again",
        ),
        Some(timeout) if timeout <= worker.poll_interval => warnings
            .push_with_hint(
                "worker.lock_timeout is not longer than the poll interval",
                "Slow thumbnails may be claimed twice; raise WORKER_LOCK_TIMEOUT",
            ),
        Some(_) => {}
    }

    let scanner = &config.scanner;
    if scanner.photo_extensions.is_empty()
        && scanner.audio_extensions.is_empty()
        && scanner.video_extensions.is_empty()
        && !scanner.index_other
    {
        warnings.push_with_hint(
            "No media extensions configured; scans will index nothing",
            "Set MEDIA_EXT_PHOTO, MEDIA_EXT_AUDIO or MEDIA_EXT_VIDEO",
        );
    }

    Ok(warnings)
}

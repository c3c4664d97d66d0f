use std::path::PathBuf;

use lumen_core::RescanJobPolicy;
use serde::{Deserialize, Serialize};

/// Raw configuration as written in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub scanner: FileScannerConfig,
    #[serde(default)]
    pub thumbnails: FileThumbnailConfig,
    #[serde(default)]
    pub tools: FileToolsConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScannerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_other: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescan_job_policy: Option<RescanJobPolicy>,
    /// humantime string, e.g. `30m`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileThumbnailConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// humantime string, or `off` to never reclaim locks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub thumb_dir: Option<PathBuf>,
    pub photo_extensions: Option<Vec<String>>,
    pub audio_extensions: Option<Vec<String>>,
    pub video_extensions: Option<Vec<String>>,
    pub index_other: Option<bool>,
    pub rescan_job_policy: Option<String>,
    pub scan_timeout: Option<String>,
    pub convert_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub worker_poll_interval: Option<String>,
    pub worker_batch_size: Option<usize>,
    pub worker_max_attempts: Option<u32>,
    pub worker_lock_timeout: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = Self::default();

        env_config.config_path = lookup("LUMEN_CONFIG").map(PathBuf::from);
        env_config.server_host = lookup("SERVER_HOST");
        env_config.server_port =
            lookup("SERVER_PORT").and_then(|s| s.parse().ok());
        env_config.database_url = lookup("DATABASE_URL");
        env_config.database_max_connections =
            lookup("DATABASE_MAX_CONNECTIONS").and_then(|s| s.parse().ok());
        env_config.thumb_dir = lookup("THUMB_DIR").map(PathBuf::from);

        env_config.photo_extensions = parse_csv_var(&lookup, "MEDIA_EXT_PHOTO");
        env_config.audio_extensions = parse_csv_var(&lookup, "MEDIA_EXT_AUDIO");
        env_config.video_extensions = parse_csv_var(&lookup, "MEDIA_EXT_VIDEO");
        env_config.index_other = parse_bool_var(&lookup, "INDEX_OTHER");
        env_config.rescan_job_policy = lookup("RESCAN_JOB_POLICY");
        env_config.scan_timeout = lookup("SCAN_TIMEOUT");

        env_config.convert_path = lookup("CONVERT_PATH").map(PathBuf::from);
        env_config.ffmpeg_path = lookup("FFMPEG_PATH").map(PathBuf::from);
        env_config.ffprobe_path = lookup("FFPROBE_PATH").map(PathBuf::from);

        env_config.worker_poll_interval = lookup("WORKER_POLL_INTERVAL");
        env_config.worker_batch_size =
            lookup("WORKER_BATCH_SIZE").and_then(|s| s.parse().ok());
        env_config.worker_max_attempts =
            lookup("WORKER_MAX_ATTEMPTS").and_then(|s| s.parse().ok());
        env_config.worker_lock_timeout = lookup("WORKER_LOCK_TIMEOUT");

        env_config
    }
}

fn parse_csv_var<F>(lookup: &F, name: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

fn parse_bool_var<F>(lookup: &F, name: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|raw| match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn csv_lists_drop_blank_entries() {
        let cfg = env(&[("MEDIA_EXT_PHOTO", "jpg, png,,  heic ")]);
        assert_eq!(
            cfg.photo_extensions,
            Some(vec!["jpg".to_string(), "png".into(), "heic".into()])
        );
        assert_eq!(cfg.audio_extensions, None);
    }

    #[test]
    fn booleans_and_numbers_ignore_garbage() {
        let cfg = env(&[
            ("INDEX_OTHER", "yes"),
            ("SERVER_PORT", "not-a-port"),
            ("WORKER_BATCH_SIZE", "25"),
        ]);
        assert_eq!(cfg.index_other, Some(true));
        assert_eq!(cfg.server_port, None);
        assert_eq!(cfg.worker_batch_size, Some(25));

        assert_eq!(env(&[("INDEX_OTHER", "maybe")]).index_other, None);
    }
}

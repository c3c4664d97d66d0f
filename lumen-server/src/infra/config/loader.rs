use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lumen_core::thumbnail::worker::LOCK_TIMEOUT_POLLS;
use lumen_core::{RescanJobPolicy, ScannerSettings, ToolPaths, WorkerConfig};
use once_cell::sync::Lazy;
use thiserror::Error;

use super::models::{Config, ConfigMetadata, DatabaseConfig, ServerConfig};
use super::sources::{EnvConfig, FileConfig};
use super::validation::{self, ConfigGuardRailError, ConfigWarnings};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("lumen.toml"),
        PathBuf::from("config/lumen.toml"),
    ]
});

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        Self::compose(
            file_config,
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }

    /// Merge file and environment values over the defaults. Environment
    /// wins over file.
    pub fn compose(
        file_config: Option<FileConfig>,
        env: EnvConfig,
        metadata: ConfigMetadata,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No lumen.toml detected; using environment variables and defaults",
                "Set LUMEN_CONFIG or create lumen.toml to persist settings",
            );
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            scanner: file_scanner,
            thumbnails: file_thumbnails,
            tools: file_tools,
            worker: file_worker,
        } = file_config.unwrap_or_default();

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: env
                .server_host
                .clone()
                .or(file_server.host)
                .unwrap_or(server_defaults.host),
            port: env
                .server_port
                .or(file_server.port)
                .unwrap_or(server_defaults.port),
        };

        let database = DatabaseConfig {
            url: env
                .database_url
                .clone()
                .or(file_database.url)
                .filter(|url| !url.trim().is_empty()),
            max_connections: env
                .database_max_connections
                .or(file_database.max_connections)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        let scanner_defaults = ScannerSettings::default();
        let rescan_job_policy = match env.rescan_job_policy.as_deref() {
            Some(raw) => raw.parse::<RescanJobPolicy>().map_err(|message| {
                ConfigLoadError::InvalidValue {
                    key: "RESCAN_JOB_POLICY",
                    message,
                }
            })?,
            None => file_scanner
                .rescan_job_policy
                .unwrap_or(scanner_defaults.rescan_job_policy),
        };
        let scan_timeout = match env.scan_timeout.or(file_scanner.timeout) {
            Some(raw) => parse_duration("SCAN_TIMEOUT", &raw)?,
            None => scanner_defaults.timeout,
        };
        let scanner = ScannerSettings {
            photo_extensions: env
                .photo_extensions
                .or(file_scanner.photo_extensions)
                .unwrap_or(scanner_defaults.photo_extensions),
            audio_extensions: env
                .audio_extensions
                .or(file_scanner.audio_extensions)
                .unwrap_or(scanner_defaults.audio_extensions),
            video_extensions: env
                .video_extensions
                .or(file_scanner.video_extensions)
                .unwrap_or(scanner_defaults.video_extensions),
            index_other: env
                .index_other
                .or(file_scanner.index_other)
                .unwrap_or(scanner_defaults.index_other),
            rescan_job_policy,
            timeout: scan_timeout,
        };

        let tool_defaults = ToolPaths::default();
        let tools = ToolPaths {
            convert: env
                .convert_path
                .or(file_tools.convert)
                .unwrap_or(tool_defaults.convert),
            ffmpeg: env
                .ffmpeg_path
                .or(file_tools.ffmpeg)
                .unwrap_or(tool_defaults.ffmpeg),
            ffprobe: env
                .ffprobe_path
                .or(file_tools.ffprobe)
                .unwrap_or(tool_defaults.ffprobe),
        };

        let worker_defaults = WorkerConfig::default();
        let poll_interval =
            match env.worker_poll_interval.or(file_worker.poll_interval) {
                Some(raw) => parse_duration("WORKER_POLL_INTERVAL", &raw)?,
                None => worker_defaults.poll_interval,
            };
        let lock_timeout =
            match env.worker_lock_timeout.or(file_worker.lock_timeout) {
                Some(raw) => parse_lock_timeout(&raw)?,
                None => Some(poll_interval * LOCK_TIMEOUT_POLLS),
            };
        let worker = WorkerConfig {
            poll_interval,
            batch_size: env
                .worker_batch_size
                .or(file_worker.batch_size)
                .unwrap_or(worker_defaults.batch_size),
            max_attempts: env
                .worker_max_attempts
                .or(file_worker.max_attempts)
                .unwrap_or(worker_defaults.max_attempts),
            lock_timeout,
            thumb_dir: env
                .thumb_dir
                .or(file_thumbnails.dir)
                .unwrap_or(worker_defaults.thumb_dir),
        };

        let config = Config {
            server,
            database,
            scanner,
            worker,
            tools,
            metadata,
        };

        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }
}

fn parse_duration(
    key: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            key,
            value: raw.to_string(),
            source,
        }
    })
}

fn parse_lock_timeout(raw: &str) -> Result<Option<Duration>, ConfigLoadError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" | "none" | "never" | "disabled" => Ok(None),
        _ => parse_duration("WORKER_LOCK_TIMEOUT", raw).map(Some),
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {key}: '{value}'")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

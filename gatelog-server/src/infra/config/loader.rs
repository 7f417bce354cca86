use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

use super::{
    models::{
        Config, ConfigLoad, ConfigMetadata, ConfigWarnings, DEFAULT_HOST,
        DEFAULT_PORT, DatabaseConfig, Environment, ResetConfig, ScanConfig,
        ServerConfig,
    },
    sources::{EnvConfig, FileConfig, parse_bool},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("gatelog.toml"),
        PathBuf::from("config/gatelog.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

/// Layers `.env`, an optional TOML file and process environment into a
/// [`Config`]. Environment values take precedence over the file.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
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
        let (config, warnings) = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        );

        Ok(ConfigLoad { config, warnings })
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
                Some(path) => path.clone(),
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge file and environment layers. Unparseable environment values are
/// reported and skipped in favour of the file value or the default.
fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> (Config, ConfigWarnings) {
    let mut warnings = ConfigWarnings::default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env::<u16>(&mut warnings, "PORT", env.server_port)
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: env
            .database_url
            .or(file.database.url)
            .filter(|url| !url.trim().is_empty()),
    };

    let cooldown_ms =
        parse_env::<u64>(&mut warnings, "COOLDOWN_MS", env.cooldown_ms)
            .or(file.scan.cooldown_ms);
    let scan = ScanConfig {
        cooldown: cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or(ScanConfig::default().cooldown),
        serialize_sessions: parse_env_bool(
            &mut warnings,
            "SERIALIZE_SESSIONS",
            env.serialize_sessions,
        )
        .or(file.scan.serialize_sessions)
        .unwrap_or(false),
    };

    let reset = ResetConfig {
        enabled: parse_env_bool(
            &mut warnings,
            "DAILY_RESET_ENABLED",
            env.daily_reset_enabled,
        )
        .or(file.reset.enabled)
        .unwrap_or(true),
    };

    let environment = match env.environment.or(file.environment) {
        Some(raw) => Environment::parse(&raw).unwrap_or_else(|| {
            warnings.push_with_hint(
                format!("Unknown environment '{raw}'; using development"),
                "Set GATELOG_ENV to `production` or `development`",
            );
            Environment::Development
        }),
        None => Environment::Development,
    };

    if environment == Environment::Production && database.url.is_none() {
        warnings.push_with_hint(
            "No DATABASE_URL provided; starting with the in-memory store",
            "Set DATABASE_URL for persistent storage",
        );
    }

    let config = Config {
        server,
        database,
        scan,
        reset,
        environment,
        metadata,
    };
    (config, warnings)
}

fn parse_env<T: FromStr>(
    warnings: &mut ConfigWarnings,
    name: &str,
    raw: Option<String>,
) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warnings.push(format!("Ignoring invalid {name} value '{raw}'"));
            None
        }
    }
}

fn parse_env_bool(
    warnings: &mut ConfigWarnings,
    name: &str,
    raw: Option<String>,
) -> Option<bool> {
    let raw = raw?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        warnings.push_with_hint(
            format!("Ignoring invalid {name} value '{raw}'"),
            "Use true/false, 1/0, yes/no or on/off",
        );
    }
    parsed
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
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

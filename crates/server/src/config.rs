use shared_types::AppConfig;

/// Path to the config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// `ADVOCASE_CONFIG` overrides the default `config.toml`.
pub fn config_path() -> String {
    std::env::var("ADVOCASE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn read_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_config(path, &contents)
}

fn parse_config(path: &str, contents: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Load the config file, then apply environment overrides.
///
/// A missing or unparseable file falls back to defaults. Runs before the
/// tracing subscriber exists, so problems are reported on stderr.
pub fn load_config() -> AppConfig {
    let path = config_path();
    let mut config = match read_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[config] {e}, using defaults");
            AppConfig::default()
        }
    };

    if let Some(bytes) = env_parse::<usize>("MAX_UPLOAD_BYTES") {
        config.uploads.max_upload_bytes = bytes;
    }
    eprintln!("[config] Feature flags: {:?}", config.features);
    config
}

pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

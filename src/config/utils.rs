use super::schemas::Config;
/// Configuration utilities - loading, reloading, and access helpers
use crate::logger::{self, LogTag};
use crate::paths;
use once_cell::sync::{Lazy, OnceCell};
use std::sync::RwLock;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Served by `with_config` before `load_config` runs
static FALLBACK: Lazy<Config> = Lazy::new(Config::default);

/// Load the default config file (`config.toml` in the data directory)
pub fn load_config() -> Result<(), String> {
    let path = paths::get_config_path();
    load_config_from_path(&path.to_string_lossy())
}

/// Parse a TOML document into a `Config`, filling omitted keys with defaults
pub fn parse_config(contents: &str) -> Result<Config, String> {
    let config =
        toml::from_str::<Config>(contents).map_err(|e| format!("Failed to parse config: {}", e))?;
    config
        .validate()
        .map_err(|e| format!("Invalid config: {}", e))?;
    Ok(config)
}

/// Load configuration from a specific file path and initialize the global CONFIG
///
/// A missing file is not an error: defaults are used.
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = if std::path::Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
        parse_config(&contents).map_err(|e| format!("{} ('{}')", e, path))?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;

    logger::info(LogTag::Config, &format!("Configuration loaded from '{}'", path));
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// # Example
/// ```
/// use challengebot::config::with_config;
///
/// let interval = with_config(|cfg| cfg.monitor.interval_secs);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => {
            let config = lock.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&config)
        }
        None => f(&FALLBACK),
    }
}

/// Clone of the entire configuration, for holding across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

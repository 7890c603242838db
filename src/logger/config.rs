/// Logger settings, built once from the command line
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Error/Warning/Info above this are dropped
    pub threshold: LogLevel,
    pub debug_tags: HashSet<LogTag>,
    pub verbose_tags: HashSet<LogTag>,
    /// `--log-tags monitor,resolver`; empty prints every tag
    pub only_tags: HashSet<LogTag>,
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            threshold: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            only_tags: HashSet::new(),
            file_logging: true,
        }
    }
}

impl LoggerConfig {
    pub fn from_args() -> Self {
        let mut config = LoggerConfig::default();

        if let Some(level) = arguments::get_arg_value("--log-level") {
            match level.parse() {
                Ok(level) => config.threshold = level,
                Err(e) => eprintln!("ignoring --log-level: {}", e),
            }
        }
        if arguments::has_arg("--verbose") {
            config.threshold = LogLevel::Verbose;
        } else if arguments::has_arg("--quiet") {
            config.threshold = LogLevel::Warning;
        }
        config.file_logging = !arguments::has_arg("--no-log-file");

        let debug_all = arguments::has_arg("--debug-all");
        for tag in LogTag::ALL {
            let key = tag.to_debug_key();
            if debug_all || arguments::has_arg(&format!("--debug-{}", key)) {
                config.debug_tags.insert(tag);
            }
            if arguments::has_arg(&format!("--verbose-{}", key)) {
                config.verbose_tags.insert(tag);
            }
        }

        if let Some(list) = arguments::get_arg_value("--log-tags") {
            config.only_tags = list.split(',').filter_map(LogTag::from_key).collect();
        }
        config
    }

    /// Errors always print; debug and verbose are opt-in per tag
    pub fn allows(&self, tag: LogTag, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => true,
            LogLevel::Debug => self.debug_tags.contains(&tag),
            LogLevel::Verbose => {
                self.threshold == LogLevel::Verbose || self.verbose_tags.contains(&tag)
            }
            _ => {
                level <= self.threshold
                    && (self.only_tags.is_empty() || self.only_tags.contains(&tag))
            }
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn init_from_args() {
    set_logger_config(LoggerConfig::from_args());
}

pub(super) fn allows(tag: LogTag, level: LogLevel) -> bool {
    LOGGER_CONFIG.read().allows(tag, level)
}

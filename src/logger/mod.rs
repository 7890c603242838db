//! Tagged, leveled logging
//!
//! Every line carries a `LogTag` naming the subsystem. Errors always print;
//! warnings and info follow `--log-level`/`--quiet`/`--log-tags`; debug lines
//! need `--debug-<tag>` (or `--debug-all`) and verbose lines `--verbose`.
//! Output goes to the console in color and, unless `--no-log-file`, to a
//! plain log file under the data directory.
//!
//! ```
//! use challengebot::logger::{self, LogTag};
//!
//! logger::info(LogTag::Monitor, "tick: 12 positions, 1 exit_submitted");
//! logger::debug(LogTag::Batch, "queued update for order 17"); // --debug-batch
//! ```

mod config;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Read flags and open the log file; call once, after the directories exist
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

fn emit(tag: LogTag, level: LogLevel, message: &str) {
    if config::allows(tag, level) {
        format::format_and_log(tag, level, message);
    }
}

pub fn error(tag: LogTag, message: &str) {
    emit(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    emit(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    emit(tag, LogLevel::Info, message);
}

/// Shown only with `--debug-<tag>`; callers on hot paths also check the
/// matching `arguments::is_debug_*_enabled` before building the message
pub fn debug(tag: LogTag, message: &str) {
    emit(tag, LogLevel::Debug, message);
}

pub fn verbose(tag: LogTag, message: &str) {
    emit(tag, LogLevel::Verbose, message);
}

/// Write out buffered file lines (shutdown)
pub fn flush() {
    file::flush_file_logging();
}

/// Command-line argument handling
///
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checks for each subsystem
/// - Small accessors for the flags the binary understands
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Overrides the collected arguments (tests and embedding callers)
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value following a flag, if any
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .filter(|value| !value.starts_with("--"))
        .cloned()
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

pub fn is_debug_monitor_enabled() -> bool {
    has_arg("--debug-monitor") || has_arg("--debug-all")
}

pub fn is_debug_resolver_enabled() -> bool {
    has_arg("--debug-resolver") || has_arg("--debug-all")
}

pub fn is_debug_signals_enabled() -> bool {
    has_arg("--debug-signals") || has_arg("--debug-all")
}

pub fn is_debug_valuation_enabled() -> bool {
    has_arg("--debug-valuation") || has_arg("--debug-all")
}

pub fn is_debug_store_enabled() -> bool {
    has_arg("--debug-store") || has_arg("--debug-all")
}

pub fn is_debug_batch_enabled() -> bool {
    has_arg("--debug-batch") || has_arg("--debug-all")
}

// =============================================================================
// RUNTIME FLAGS
// =============================================================================

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Alternate config file (`--config <path>`)
pub fn get_config_path() -> Option<String> {
    get_arg_value("--config")
}

/// Alternate database file (`--db <path>`)
pub fn get_database_path() -> Option<String> {
    get_arg_value("--db")
}

/// Run one monitor tick and one resolver tick, then exit
pub fn is_single_pass_enabled() -> bool {
    has_arg("--once")
}

/// Disable the background valuation sync even if the config enables it
pub fn is_sync_disabled() -> bool {
    has_arg("--no-sync")
}

pub fn print_help() {
    println!("challengebot - position reconciliation for funded trading challenges");
    println!();
    println!("USAGE:");
    println!("    challengebot [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --config <path>           Load configuration from <path>");
    println!("    --db <path>               Use <path> as the position database");
    println!("    --once                    Run a single monitor and resolver pass, then exit");
    println!("    --no-sync                 Disable the background valuation sync");
    println!("    --quiet                   Only warnings and errors");
    println!("    --verbose                 Everything, including verbose traces");
    println!("    --no-log-file             Console output only");
    println!("    --log-level <level>       error, warning, info, debug or verbose");
    println!("    --log-tags <a,b>          Only print these tags (errors always print)");
    println!("    --help, -h                Show this help message");
    println!();
    println!("DEBUG FLAGS:");
    println!("    --debug-monitor           Monitor loop decisions");
    println!("    --debug-resolver          Processing resolver decisions");
    println!("    --debug-operations        Initiate/adjust/close/terminate");
    println!("    --debug-signals           Signal gateway requests and responses");
    println!("    --debug-valuation         Venue feed and valuation cache");
    println!("    --debug-sync              Background valuation sync");
    println!("    --debug-store             Database access");
    println!("    --debug-batch             Deferred write queue");
    println!("    --debug-notify            Notification dispatch");
    println!("    --debug-all               All of the above");
    println!("    --verbose-<tag>           Verbose traces for a single tag");
    println!();
    println!("EXAMPLES:");
    println!("    challengebot                                  # Run with data/config.toml");
    println!("    challengebot --config prod.toml --quiet       # Alternate config, warnings only");
    println!("    challengebot --once --debug-monitor           # One traced pass");
}

/// Debug modes currently enabled, for the startup banner
pub fn get_enabled_debug_modes() -> Vec<String> {
    get_cmd_args()
        .iter()
        .filter_map(|a| a.strip_prefix("--debug-"))
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // single test: CMD_ARGS is process-global
    #[test]
    fn test_argument_accessors() {
        set_cmd_args(vec![
            "challengebot".to_string(),
            "--debug-monitor".to_string(),
            "--config".to_string(),
            "custom.toml".to_string(),
            "--db".to_string(),
            "--once".to_string(),
        ]);

        assert!(has_arg("--debug-monitor"));
        assert!(is_debug_monitor_enabled());
        assert!(!is_debug_signals_enabled());
        assert_eq!(get_config_path(), Some("custom.toml".to_string()));
        // a flag is never taken as a value
        assert_eq!(get_database_path(), None);
        assert!(is_single_pass_enabled());
        assert_eq!(get_enabled_debug_modes(), vec!["monitor".to_string()]);

        set_cmd_args(vec!["challengebot".to_string()]);
        assert!(!is_help_requested());
    }
}

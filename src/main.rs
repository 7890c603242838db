use challengebot::{
    arguments::{get_enabled_debug_modes, is_help_requested, print_help},
    logger::{self, LogTag},
};

#[tokio::main]
async fn main() {
    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    // the logger writes into the logs directory
    if let Err(e) = challengebot::paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }
    logger::init();

    logger::info(
        LogTag::System,
        &format!("challengebot {} starting", env!("CARGO_PKG_VERSION")),
    );
    let debug_modes = get_enabled_debug_modes();
    if !debug_modes.is_empty() {
        logger::info(LogTag::System, &format!("debug modes: {}", debug_modes.join(", ")));
    }

    if let Err(e) = challengebot::run::run_bot().await {
        logger::error(LogTag::System, &format!("fatal: {:#}", e));
        logger::flush();
        std::process::exit(1);
    }
}

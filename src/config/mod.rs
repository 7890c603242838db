/// Configuration system
///
/// Sections are declared once with `config_struct!` (schemas.rs) and loaded
/// from TOML into a global `CONFIG` (utils.rs). Services take the values they
/// need at construction; only the binary reads the global.
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{get_config_clone, load_config, load_config_from_path, parse_config, with_config};

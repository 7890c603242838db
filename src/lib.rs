pub mod arguments;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logger;
pub mod notifications;
pub mod paths;
pub mod positions;
pub mod run;
pub mod services;
pub mod testing;
pub mod venue;

pub mod config;
pub mod constants;
pub mod duration;

pub use config::{ConfigError, PoolgridConfig};
pub use duration::parse_duration_secs;

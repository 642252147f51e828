/// Blocking bridge for driving async work from synchronous capabilities.
pub mod sync_bridge;
/// TOML configuration and secret resolution.
pub mod toml_config;

pub use sync_bridge::run_sync;

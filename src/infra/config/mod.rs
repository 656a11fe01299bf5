mod app_config;
mod file_config;
mod loader;

pub use app_config::{AppConfig, GatewayConfig, IdentityConfig, LogConfig, SyncConfig};
pub use loader::{load, DEFAULT_CONFIG_PATH};

pub mod app_config;

pub use app_config::{AppConfig, AppConfigError, APP_CONFIG_FILE};

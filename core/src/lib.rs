pub mod config_store;
pub mod error;
pub mod i18n;
pub mod logging;

// Re-exports for convenience
pub use config_store::{APP_DIR_NAME, CONFIG_FILE_NAME, ConfigStore, app_dir, default_config_path};
pub use error::ConfigError;
pub use i18n::{Language, Localizer};

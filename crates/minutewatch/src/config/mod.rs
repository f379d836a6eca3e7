pub mod loader;
pub mod settings;

pub use loader::{apply_env_overrides, load_settings, load_settings_from_str, DATA_DIR_ENV};
pub use settings::{
    default_data_dir, HttpSettings, JobSettings, LogFormat, LoggingSettings, RetentionSettings,
    RetrySettings, Settings,
};

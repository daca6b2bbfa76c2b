pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, load_config, load_config_from_str, load_config_with_env, merge_values,
    validate_config, ConfigFormat, ENV_PREFIX, ENV_SEPARATOR,
};
pub use schema::{CategoryConfig, Config, ExtractionConfig, GeneralConfig, LoggingConfig};

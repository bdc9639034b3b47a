pub mod loader;
pub mod schema;

pub use loader::{
    env_key, load_config, load_config_from_str, load_config_with_env, lookup, resolve_config,
    user_config_path, validate_config,
};
pub use schema::{
    Backoff, CaseConversion, Config, DatabaseConfig, FileOperationsConfig, FilenameConfig,
    ImageFormat, ImagesConfig, LogFormat, LoggingConfig, MetadataConfig, OllamaConfig,
    ProcessingConfig,
};

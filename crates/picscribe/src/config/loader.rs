use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const LOCAL_CONFIG_FILE: &str = "picscribe.yaml";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses YAML, then applies overrides from the process environment.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    load_config_with_env(Some(content), |key| std::env::var(key).ok())
}

/// Loads the config the CLI would use: an explicit file, then `./picscribe.yaml`,
/// then the per-user config directory, then built-in defaults.
///
/// Returns the config together with the file it came from, if any.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }

    let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), user_config_path()];
    for candidate in candidates.into_iter().flatten() {
        if candidate.is_file() {
            log::debug!("Using config file {}", candidate.display());
            return Ok((load_config(&candidate)?, Some(candidate)));
        }
    }

    let config = load_config_with_env(None, |key| std::env::var(key).ok())?;
    Ok((config, None))
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("picscribe").join("config.yaml"))
}

/// Core of the loader with the environment injected, so overrides can be tested
/// without touching process state.
pub fn load_config_with_env<F>(content: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_yaml::to_value(Config::default())?;

    let mut merged = defaults.clone();
    if let Some(content) = content {
        let file_value: Value = serde_yaml::from_str(content)?;
        match file_value {
            Value::Null => {}
            Value::Mapping(_) => merge(&mut merged, file_value),
            _ => {
                return Err(ConfigError::Validation {
                    message: "config root must be a mapping".to_string(),
                })
            }
        }
    }

    let mut leaves = Vec::new();
    collect_leaves(&defaults, String::new(), &mut leaves);
    for (dotted, template) in leaves {
        let env_key = env_key(&dotted);
        if let Some(raw) = env(&env_key) {
            log::debug!("Overriding {} from {}", dotted, env_key);
            set_path(&mut merged, &dotted, coerce(&raw, &template));
        }
    }

    let config: Config = serde_yaml::from_value(merged).map_err(|e| {
        // Deserialization errors on merged values are most often bad env values.
        ConfigError::Validation {
            message: e.to_string(),
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// `ollama.retry_attempts` -> `OLLAMA_RETRY_ATTEMPTS`
pub fn env_key(dotted: &str) -> String {
    dotted.replace('.', "_").to_uppercase()
}

/// Resolves a dotted key such as `ollama.model` against a YAML value tree.
pub fn lookup<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(value, |current, part| match current {
        Value::Mapping(map) => map.get(part),
        _ => None,
    })
}

impl Config {
    /// Value of a dotted key, e.g. `filename.separator`.
    pub fn get(&self, dotted: &str) -> Result<Value, ConfigError> {
        let tree = serde_yaml::to_value(self)?;
        lookup(&tree, dotted)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownKey(dotted.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn collect_leaves(value: &Value, prefix: String, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = key.as_str() else { continue };
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaves(child, path, out);
            }
        }
        leaf => out.push((prefix, leaf.clone())),
    }
}

fn set_path(root: &mut Value, dotted: &str, new_value: Value) {
    let mut current = root;
    let mut parts = dotted.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = current else { return };
        let key = Value::String(part.to_string());
        if parts.peek().is_none() {
            map.insert(key, new_value);
            return;
        }
        current = map.entry(key).or_insert_with(|| Value::Mapping(Mapping::new()));
    }
}

/// Turns an environment string into a YAML value shaped like the default it replaces.
fn coerce(raw: &str, template: &Value) -> Value {
    match template {
        Value::String(_) => Value::String(raw.to_string()),
        Value::Sequence(_) => Value::Sequence(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        _ => coerce_scalar(raw),
    }
}

fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Number(f.into());
    }
    Value::String(raw.to_string())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    let endpoint = config.ollama.endpoint.trim();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return invalid(format!(
            "ollama.endpoint must be an http(s) URL, got '{}'",
            config.ollama.endpoint
        ));
    }
    if config.ollama.model.trim().is_empty() {
        return invalid("ollama.model must not be empty".to_string());
    }
    if !(config.ollama.timeout > 0.0) {
        return invalid("ollama.timeout must be positive".to_string());
    }
    if !(config.ollama.connect_timeout > 0.0) {
        return invalid("ollama.connect_timeout must be positive".to_string());
    }
    if config.ollama.retry_attempts < 1 {
        return invalid("ollama.retry_attempts must be at least 1".to_string());
    }
    if config.ollama.retry_delay < 0.0 {
        return invalid("ollama.retry_delay must not be negative".to_string());
    }

    if config.images.supported_extensions.is_empty() {
        return invalid("images.supported_extensions must not be empty".to_string());
    }
    if !(config.images.max_file_size_mb > 0.0) {
        return invalid("images.max_file_size_mb must be positive".to_string());
    }

    if config.filename.max_length < 1 {
        return invalid("filename.max_length must be at least 1".to_string());
    }
    let mut separator = config.filename.separator.chars();
    let valid_separator = match (separator.next(), separator.next()) {
        (Some(c), None) => {
            c.is_ascii() && !c.is_ascii_alphanumeric() && !c.is_ascii_control()
                && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' | ' ')
        }
        _ => false,
    };
    if !valid_separator {
        return invalid(format!(
            "filename.separator must be a single non-alphanumeric filename-safe character, got '{}'",
            config.filename.separator
        ));
    }
    if config.filename.fallback_name.trim().is_empty() {
        return invalid("filename.fallback_name must not be empty".to_string());
    }

    if config.file_operations.safe_move_retries < 1 {
        return invalid("file_operations.safe_move_retries must be at least 1".to_string());
    }
    if config.file_operations.retry_delay < 0.0 {
        return invalid("file_operations.retry_delay must not be negative".to_string());
    }
    let backup_dir = config.file_operations.backup_directory.trim();
    if backup_dir.is_empty() || backup_dir.contains(['/', '\\']) {
        return invalid(
            "file_operations.backup_directory must be a single directory name".to_string(),
        );
    }

    if config.metadata.retry_attempts < 1 {
        return invalid("metadata.retry_attempts must be at least 1".to_string());
    }
    if config.metadata.retry_delay < 0.0 {
        return invalid("metadata.retry_delay must not be negative".to_string());
    }

    if config.database.path.as_os_str().is_empty() {
        return invalid("database.path must not be empty".to_string());
    }

    if config.processing.workers < 1 {
        return invalid("processing.workers must be at least 1".to_string());
    }
    if !(config.processing.watch_poll_interval > 0.0) {
        return invalid("processing.watch_poll_interval must be positive".to_string());
    }

    Ok(())
}

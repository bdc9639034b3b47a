use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub images: ImagesConfig,
    pub filename: FilenameConfig,
    pub file_operations: FileOperationsConfig,
    pub metadata: MetadataConfig,
    pub database: DatabaseConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout: f64,
    pub connect_timeout: f64,
    pub retry_attempts: u32,
    /// Delay between attempts in seconds.
    pub retry_delay: f64,
    pub backoff: Backoff,
    pub describe_prompt: String,
    pub filename_prompt: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llava".to_string(),
            timeout: 30.0,
            connect_timeout: 10.0,
            retry_attempts: 3,
            retry_delay: 1.0,
            backoff: Backoff::Fixed,
            describe_prompt: "Describe this image in detail.".to_string(),
            filename_prompt: "Describe this image in 4-5 words".to_string(),
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        seconds(self.connect_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Extensions without the leading dot, compared case-insensitively.
    pub supported_extensions: Vec<String>,
    pub max_file_size_mb: f64,
    pub verify_before_processing: bool,
    pub recursive: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            supported_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_mb: 50.0,
            verify_before_processing: true,
            recursive: true,
        }
    }
}

impl ImagesConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        (self.max_file_size_mb * 1024.0 * 1024.0) as u64
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.supported_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilenameConfig {
    pub max_length: usize,
    pub case_conversion: CaseConversion,
    /// Single character placed between words.
    pub separator: String,
    pub remove_punctuation: bool,
    pub fallback_name: String,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            max_length: 100,
            case_conversion: CaseConversion::Lower,
            separator: "-".to_string(),
            remove_punctuation: true,
            fallback_name: "untitled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseConversion {
    Lower,
    Upper,
    Title,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileOperationsConfig {
    pub safe_move_retries: u32,
    /// Delay between move attempts in seconds.
    pub retry_delay: f64,
    pub backup_originals: bool,
    /// Created next to each source file. Hidden names keep it out of scans.
    pub backup_directory: String,
}

impl Default for FileOperationsConfig {
    fn default() -> Self {
        Self {
            safe_move_retries: 3,
            retry_delay: 0.5,
            backup_originals: false,
            backup_directory: ".originals".to_string(),
        }
    }
}

impl FileOperationsConfig {
    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub retry_attempts: u32,
    pub retry_delay: f64,
    pub subject: String,
    pub creator_tool: String,
    pub sidecar_fallback: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: 1.0,
            subject: "AI Generated Description".to_string(),
            creator_tool: format!("picscribe {}", env!("CARGO_PKG_VERSION")),
            sidecar_fallback: true,
        }
    }
}

impl MetadataConfig {
    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("image_descriptions.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub workers: usize,
    /// Poll interval of watch mode in seconds.
    pub watch_poll_interval: f64,
    /// Record renamed files in the store so reruns skip them.
    pub record_renames: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            watch_poll_interval: 2.0,
            record_renames: true,
        }
    }
}

impl ProcessingConfig {
    pub fn watch_poll_interval(&self) -> Duration {
        seconds(self.watch_poll_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Image format declared by a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Tiff,
    Other,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::Webp,
            "tif" | "tiff" => Self::Tiff,
            _ => Self::Other,
        }
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_jpeg_variants() {
        assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("JPEG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension(".jpe"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_from_extension_unknown() {
        assert_eq!(ImageFormat::from_extension("heic"), ImageFormat::Other);
        assert_eq!(ImageFormat::from_extension(""), ImageFormat::Other);
    }

    #[test]
    fn test_is_supported_ignores_case_and_dot() {
        let images = ImagesConfig::default();
        assert!(images.is_supported("PNG"));
        assert!(images.is_supported(".jpg"));
        assert!(!images.is_supported("txt"));
    }

    #[test]
    fn test_max_file_size_bytes() {
        let images = ImagesConfig {
            max_file_size_mb: 1.5,
            ..Default::default()
        };
        assert_eq!(images.max_file_size_bytes(), 1_572_864);
    }

    #[test]
    fn test_negative_delay_is_zero() {
        let ollama = OllamaConfig {
            retry_delay: -1.0,
            ..Default::default()
        };
        assert_eq!(ollama.retry_delay(), Duration::ZERO);
    }
}

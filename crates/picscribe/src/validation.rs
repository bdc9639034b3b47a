//! Local checks run before an image is sent to the vision endpoint.

use std::path::Path;

use crate::config::{ImageFormat, ImagesConfig};
use crate::error::ValidationError;

#[derive(Debug, Clone)]
pub struct ImageValidator {
    extensions: Vec<String>,
    max_size: u64,
    verify: bool,
}

/// Facts established by a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedImage {
    pub size: u64,
    /// Both `None` when content verification is off.
    pub dimensions: Option<(u32, u32)>,
    /// Format detected from the content, which wins over the extension.
    pub format: Option<ImageFormat>,
}

impl ImageValidator {
    pub fn new(extensions: Vec<String>, max_size: u64, verify: bool) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_size,
            verify,
        }
    }

    pub fn from_config(config: &ImagesConfig) -> Self {
        Self::new(
            config.supported_extensions.clone(),
            config.max_file_size_bytes(),
            config.verify_before_processing,
        )
    }

    /// Checks, in order: existence, regular file, extension, size, and (when
    /// enabled) that the content decodes far enough to read dimensions.
    pub fn validate(&self, path: &Path) -> Result<ValidatedImage, ValidationError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => return Err(ValidationError::Missing(path.to_path_buf())),
        };
        if !metadata.is_file() {
            return Err(ValidationError::NotAFile(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        if !self
            .extensions
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&extension))
        {
            return Err(ValidationError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            });
        }

        let size = metadata.len();
        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_size,
            });
        }

        if !self.verify {
            return Ok(ValidatedImage {
                size,
                dimensions: None,
                format: None,
            });
        }

        let (format, dimensions) = verify_content(path)?;
        Ok(ValidatedImage {
            size,
            dimensions: Some(dimensions),
            format: Some(format),
        })
    }
}

fn verify_content(path: &Path) -> Result<(ImageFormat, (u32, u32)), ValidationError> {
    let corrupted = |reason: String| ValidationError::Corrupted {
        path: path.to_path_buf(),
        reason,
    };

    let reader = image::ImageReader::open(path)
        .map_err(|e| corrupted(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| corrupted(e.to_string()))?;

    let format = match reader.format() {
        Some(detected) => detected
            .extensions_str()
            .first()
            .map(|ext| ImageFormat::from_extension(ext))
            .unwrap_or(ImageFormat::Other),
        None => return Err(corrupted("unrecognized image data".to_string())),
    };

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| corrupted(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(corrupted(format!("invalid dimensions {}x{}", width, height)));
    }
    Ok((format, (width, height)))
}

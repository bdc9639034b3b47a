//! Writes descriptions into image files as XMP metadata.
//!
//! JPEG and PNG files get the packet embedded in place. Every other format
//! gets a `<file>.<ext>.xmp` sidecar next to it when sidecars are enabled.

pub mod jpeg;
pub mod png;
pub mod xmp;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{ImageFormat, MetadataConfig};
use crate::error::MetadataError;
use xmp::XmpFields;

/// Where a description ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedOutcome {
    Embedded,
    Sidecar(PathBuf),
}

#[derive(Debug, Clone)]
pub struct MetadataWriter {
    subject: String,
    creator_tool: String,
    sidecar_fallback: bool,
    attempts: u32,
    delay: Duration,
}

impl MetadataWriter {
    pub fn from_config(config: &MetadataConfig) -> Self {
        Self {
            subject: config.subject.clone(),
            creator_tool: config.creator_tool.clone(),
            sidecar_fallback: config.sidecar_fallback,
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay(),
        }
    }

    /// `photo.gif` -> `photo.gif.xmp`
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".xmp");
        PathBuf::from(name)
    }

    /// Embeds with retries on I/O failures. Format errors fail at once.
    pub fn embed_with_retry(
        &self,
        path: &Path,
        format: ImageFormat,
        description: &str,
    ) -> Result<EmbedOutcome, MetadataError> {
        let mut attempt = 1;
        loop {
            match self.embed(path, format, description) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_retryable(&e) && attempt < self.attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.attempts,
                        "Metadata write failed, retrying: {}",
                        e
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt at writing `description` into `path`.
    pub fn embed(
        &self,
        path: &Path,
        format: ImageFormat,
        description: &str,
    ) -> Result<EmbedOutcome, MetadataError> {
        let packet = xmp::build_packet(&XmpFields {
            description,
            subject: &self.subject,
            creator_tool: &self.creator_tool,
        });

        match format {
            ImageFormat::Jpeg | ImageFormat::Png => {
                let data = std::fs::read(path).map_err(|e| MetadataError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let updated = if format == ImageFormat::Jpeg {
                    jpeg::embed_xmp(&data, &packet, path)?
                } else {
                    png::embed_xmp(&data, &packet, path)?
                };
                replace_contents(path, &updated)?;
                debug!(bytes = packet.len(), "Embedded XMP packet");
                Ok(EmbedOutcome::Embedded)
            }
            _ if self.sidecar_fallback => {
                let sidecar = Self::sidecar_path(path);
                write_new_contents(&sidecar, packet.as_bytes(), None)?;
                debug!("Wrote XMP sidecar");
                Ok(EmbedOutcome::Sidecar(sidecar))
            }
            _ => Err(MetadataError::Unsupported(path.to_path_buf())),
        }
    }

    /// Reads back the description written by [`MetadataWriter::embed`], or by any
    /// other XMP-aware tool.
    pub fn read_description(
        &self,
        path: &Path,
        format: ImageFormat,
    ) -> Result<Option<String>, MetadataError> {
        let packet = match format {
            ImageFormat::Jpeg | ImageFormat::Png => {
                let data = std::fs::read(path).map_err(|e| MetadataError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                if format == ImageFormat::Jpeg {
                    jpeg::read_xmp(&data, path)?
                } else {
                    png::read_xmp(&data, path)?
                }
            }
            _ => {
                let sidecar = Self::sidecar_path(path);
                match std::fs::read_to_string(&sidecar) {
                    Ok(text) => Some(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => {
                        return Err(MetadataError::Read {
                            path: sidecar,
                            source: e,
                        })
                    }
                }
            }
        };

        match packet {
            Some(packet) => xmp::parse_description(&packet),
            None => Ok(None),
        }
    }
}

fn is_retryable(error: &MetadataError) -> bool {
    matches!(
        error,
        MetadataError::Read { .. } | MetadataError::Write { .. }
    )
}

/// Replaces an existing file, keeping its permissions.
fn replace_contents(path: &Path, contents: &[u8]) -> Result<(), MetadataError> {
    let permissions = std::fs::metadata(path)
        .map_err(|e| MetadataError::Read {
            path: path.to_path_buf(),
            source: e,
        })?
        .permissions();
    write_new_contents(path, contents, Some(permissions))
}

/// Writes into a temp file in the same directory, then renames it over `path`.
/// A crash mid-write leaves the original untouched.
fn write_new_contents(
    path: &Path,
    contents: &[u8],
    permissions: Option<std::fs::Permissions>,
) -> Result<(), MetadataError> {
    let write_err = |e: std::io::Error| MetadataError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(contents).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions).map_err(write_err)?;
    }
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

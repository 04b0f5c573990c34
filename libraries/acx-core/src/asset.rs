//! Audio assets handled by the pipeline

use crate::engine::Probe;
use crate::BYTES_PER_MB;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Container types accepted as input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Mp3,
    Wav,
}

impl ContainerKind {
    /// Match a file extension, ignoring case
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }
}

/// A file on disk plus what is known about it
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    path: PathBuf,
    extension: String,
    byte_size: u64,
    probe: Option<Probe>,
}

impl AudioAsset {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>, byte_size: u64) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
            byte_size,
            probe: None,
        }
    }

    /// Build an asset from a file on disk, taking the extension from its name
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let byte_size = tokio::fs::metadata(&path).await?.len();
        let extension = extension_of(&path).unwrap_or_default();
        Ok(Self::new(path, extension, byte_size))
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension as declared by the uploader, not normalized
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn size_mb(&self) -> f64 {
        self.byte_size as f64 / BYTES_PER_MB as f64
    }

    pub fn probe(&self) -> Option<&Probe> {
        self.probe.as_ref()
    }

    pub fn container(&self) -> Option<ContainerKind> {
        ContainerKind::from_extension(&self.extension)
    }
}

/// Extension of a file name, without the dot
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_match_ignores_case() {
        assert_eq!(ContainerKind::from_extension("MP3"), Some(ContainerKind::Mp3));
        assert_eq!(ContainerKind::from_extension("Wav"), Some(ContainerKind::Wav));
        assert_eq!(ContainerKind::from_extension("flac"), None);
        assert_eq!(ContainerKind::from_extension(""), None);
    }

    #[test]
    fn test_asset_container_from_declared_extension() {
        let asset = AudioAsset::new("/tmp/x/input.WAV", "WAV", 2 * BYTES_PER_MB);
        assert_eq!(asset.container(), Some(ContainerKind::Wav));
        assert_eq!(asset.size_mb(), 2.0);
    }

    #[test]
    fn test_extension_of_file_without_dot() {
        assert_eq!(extension_of(Path::new("/tmp/README")), None);
        assert_eq!(extension_of(Path::new("/tmp/book.Mp3")), Some("Mp3".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_extension_is_still_an_extension() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/book.m\xffa"));
        let extension = extension_of(path).unwrap();
        assert_eq!(extension, "m\u{FFFD}a");
        assert_eq!(ContainerKind::from_extension(&extension), None);
    }
}

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::types::ArtifactRef;

/// Media category of an artifact, derived from its filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
    Audio,
    Unknown,
}

impl ArtifactKind {
    /// Classify by the lower-cased text after the last `.`.
    ///
    /// Names without a `.` (including the empty name) are `Unknown`.
    pub fn from_filename(filename: &str) -> Self {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return ArtifactKind::Unknown,
        };
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "bmp" | "tiff" => ArtifactKind::Image,
            "mp4" | "mkv" | "webm" | "gif" | "avi" | "mov" => ArtifactKind::Video,
            "mp3" | "wav" | "flac" | "ogg" => ArtifactKind::Audio,
            _ => ArtifactKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displays a decoded image to the user.
pub trait ImageViewer {
    fn show(&self, image: &DynamicImage, filename: &str) -> io::Result<()>;
}

/// Opens images with the platform's default viewer.
///
/// The image is written as PNG to the system temp directory first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemViewer;

impl ImageViewer for SystemViewer {
    fn show(&self, image: &DynamicImage, filename: &str) -> io::Result<()> {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preview".to_string());
        let path = std::env::temp_dir().join(format!("comfyui-preview-{}.png", stem));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(io::Error::other)?;
        open_with_platform_viewer(&path)
    }
}

fn open_with_platform_viewer(path: &Path) -> io::Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(path).spawn()?;
    Ok(())
}

/// A file produced by a completed prompt.
///
/// Immutable once built. The kind is fixed from the filename at construction;
/// an image decode is attempted for preview and left empty if it fails.
#[derive(Debug, Clone)]
pub struct Artifact {
    data: Vec<u8>,
    filename: String,
    source_type: String,
    kind: ArtifactKind,
    image: Option<DynamicImage>,
}

impl Artifact {
    pub fn new(
        data: Vec<u8>,
        filename: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        let kind = ArtifactKind::from_filename(&filename);
        let image = image::load_from_memory(&data).ok();
        Self {
            data,
            filename,
            source_type: source_type.into(),
            kind,
            image,
        }
    }

    pub(crate) fn from_ref(data: Vec<u8>, file: &ArtifactRef) -> Self {
        Self::new(data, file.filename.clone(), file.folder_type.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Storage class the file was fetched from (`output`, `temp`, ...).
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The decoded image, if the bytes could be decoded as one.
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| (img.width(), img.height()))
    }

    /// Write the bytes to the original filename, replacing any existing file.
    pub fn save(&self) -> io::Result<PathBuf> {
        let path = PathBuf::from(&self.filename);
        self.save_as(&path)?;
        Ok(path)
    }

    /// Write the bytes to `path`, replacing any existing file.
    pub fn save_as(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, &self.data)
    }

    /// Show the artifact with the platform image viewer.
    ///
    /// Returns `Ok(false)` without doing anything if no image was decoded.
    pub fn preview(&self) -> io::Result<bool> {
        self.preview_with(&SystemViewer)
    }

    /// Show the artifact with a caller-supplied viewer.
    pub fn preview_with<V: ImageViewer + ?Sized>(&self, viewer: &V) -> io::Result<bool> {
        match &self.image {
            Some(image) => {
                viewer.show(image, &self.filename)?;
                Ok(true)
            }
            None => {
                info!(filename = %self.filename, "cannot preview non-image file");
                Ok(false)
            }
        }
    }
}

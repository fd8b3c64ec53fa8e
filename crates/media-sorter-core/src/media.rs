use std::path::{Path, PathBuf};

use crate::date::ResolvedDate;

/// Image extensions, lowercase and without the leading dot.
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Video extensions, lowercase and without the leading dot.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi", "mkv", "3gp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a lowercase extension. `None` means the file is ignored.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if IMAGE_EXTS.contains(&ext) {
            Some(Self::Image)
        } else if VIDEO_EXTS.contains(&ext) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute path of the source file
    pub path: PathBuf,
    /// Lowercase extension, without the dot
    pub extension: String,
    pub kind: MediaKind,
    /// Filled in by the date resolver
    pub date: Option<ResolvedDate>,
}

impl MediaFile {
    /// Build a media file from a path, or `None` if its extension is not on
    /// the allow-list.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = lowercase_extension(&path)?;
        let kind = MediaKind::from_extension(&extension)?;
        Some(Self {
            path,
            extension,
            kind,
            date: None,
        })
    }

    /// Just the filename
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

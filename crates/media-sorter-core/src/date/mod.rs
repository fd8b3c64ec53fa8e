pub mod container;
pub mod exif;

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};

use crate::media::{MediaFile, MediaKind};

/// Which strategy produced a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// EXIF `DateTimeOriginal`
    Exif,
    /// Video container creation time
    Container,
    /// Filesystem modification time
    Modified,
}

/// Result of date resolution: local wall-clock time + where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub timestamp: NaiveDateTime,
    pub source: DateSource,
}

/// Resolve the date of any path. Files outside the allow-list go straight to
/// the modification time.
pub fn resolve(path: &Path) -> io::Result<ResolvedDate> {
    match MediaFile::from_path(path) {
        Some(file) => resolve_file(&file),
        None => modified_date(path),
    }
}

/// Resolve a media file's date in priority order:
/// 1. EXIF capture time (images)
/// 2. Container creation time (videos)
/// 3. Filesystem modification time
///
/// Metadata failures fall through to the next strategy. The only error is
/// the file's own metadata being unreadable.
pub fn resolve_file(file: &MediaFile) -> io::Result<ResolvedDate> {
    let embedded = match file.kind {
        MediaKind::Image => exif::extract_exif_date(&file.path).map(|timestamp| ResolvedDate {
            timestamp,
            source: DateSource::Exif,
        }),
        MediaKind::Video => container::extract_container_date(&file.path, &file.extension).map(
            |timestamp| ResolvedDate {
                timestamp,
                source: DateSource::Container,
            },
        ),
    };

    if let Some(date) = embedded {
        tracing::debug!(path = %file.path.display(), source = ?date.source, "embedded date found");
        return Ok(date);
    }

    tracing::debug!(path = %file.path.display(), "no embedded date, using modification time");
    modified_date(&file.path)
}

/// Filesystem last-modified time, as local wall-clock time.
pub fn modified_date(path: &Path) -> io::Result<ResolvedDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(ResolvedDate {
        timestamp: DateTime::<Local>::from(modified).naive_local(),
        source: DateSource::Modified,
    })
}

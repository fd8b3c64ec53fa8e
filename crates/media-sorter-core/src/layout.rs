use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Output root, created inside the source folder.
pub const OUTPUT_DIR_NAME: &str = "sorted_output";

/// Fallback folder for files that could not be dated or transferred.
pub const QUARANTINE_DIR_NAME: &str = "undated_or_error";

/// Where sorted files land: `<source>/sorted_output/{YYYY-MM,undated_or_error}`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    quarantine: PathBuf,
}

impl OutputLayout {
    /// Layout for a source folder. The source should already be absolute and
    /// normalized so that [`contains`](Self::contains) compares like with like.
    pub fn for_source(source: &Path) -> Self {
        let root = source.join(OUTPUT_DIR_NAME);
        let quarantine = root.join(QUARANTINE_DIR_NAME);
        Self { root, quarantine }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine
    }

    /// Create the output root and the quarantine folder up front.
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.quarantine)
    }

    /// Destination folder for a date, without touching the filesystem.
    /// `None` means the date could not be resolved.
    pub fn folder_for(&self, date: Option<NaiveDateTime>) -> PathBuf {
        match date {
            Some(dt) => self.root.join(dt.format("%Y-%m").to_string()),
            None => self.quarantine.clone(),
        }
    }

    /// Map a date to its destination folder and make sure the folder exists.
    pub fn route(&self, date: Option<NaiveDateTime>) -> io::Result<PathBuf> {
        let folder = self.folder_for(date);
        fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    /// Whether `path` is the output root or anything below it.
    /// Comparison is per path component, so `sorted_output_old` is not inside.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

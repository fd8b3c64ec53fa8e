use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::error::{Result, SortError};
use crate::layout::OutputLayout;
use crate::media::MediaFile;
use crate::{LogSink, SortAction, SortEvent};

/// Where a file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Transferred(PathBuf),
    Quarantined(PathBuf),
}

/// Copies or moves media files into their destination folder, falling back
/// to a copy into the quarantine folder when that fails.
pub struct Transfer<'a> {
    layout: &'a OutputLayout,
    sink: &'a LogSink<'a>,
}

impl<'a> Transfer<'a> {
    pub fn new(layout: &'a OutputLayout, sink: &'a LogSink<'a>) -> Self {
        Self { layout, sink }
    }

    /// Transfer `file` into `folder`. Any failure of the primary transfer is
    /// logged and the file is copied into the quarantine folder instead.
    /// Only a failing quarantine copy is returned as an error.
    pub fn transfer(&self, file: &MediaFile, folder: &Path, action: SortAction) -> Result<Outcome> {
        match transfer_into(&file.path, folder, action) {
            Ok(dest) => {
                (self.sink)(&SortEvent::Transferred {
                    action,
                    source: file.path.clone(),
                    folder: folder.to_path_buf(),
                });
                Ok(Outcome::Transferred(dest))
            }
            Err(e) => self.quarantine(file, &e.to_string()),
        }
    }

    /// Best-effort copy of `file` into the quarantine folder. `cause` is the
    /// failure that sent it there and ends up in the log.
    pub fn quarantine(&self, file: &MediaFile, cause: &str) -> Result<Outcome> {
        tracing::warn!(path = %file.path.display(), cause, "quarantining file");
        (self.sink)(&SortEvent::Failed {
            source: file.path.clone(),
            cause: cause.to_string(),
        });

        let dest = transfer_into(&file.path, self.layout.quarantine_dir(), SortAction::Copy).map_err(
            |source| SortError::Quarantine {
                path: file.path.clone(),
                cause: cause.to_string(),
                source,
            },
        )?;

        (self.sink)(&SortEvent::Quarantined {
            source: file.path.clone(),
        });
        Ok(Outcome::Quarantined(dest))
    }
}

/// Ensure `folder` exists, pick a free name in it and copy or move `src` there.
fn transfer_into(src: &Path, folder: &Path, action: SortAction) -> io::Result<PathBuf> {
    fs::create_dir_all(folder)?;
    let name = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let dest = unique_destination(folder, Path::new(name));

    match action {
        SortAction::Copy => copy_preserving(src, &dest)?,
        SortAction::Move => move_file(src, &dest)?,
    }
    Ok(dest)
}

/// `folder/name`, or `folder/stem(N).ext` with the first free N if that is taken.
pub(crate) fn unique_destination(folder: &Path, name: &Path) -> PathBuf {
    let base = folder.join(name);
    if !base.exists() {
        return base;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = name
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut counter = 0u32;
    loop {
        counter += 1;
        let new_name = if ext.is_empty() {
            format!("{}({})", stem, counter)
        } else {
            format!("{}({}).{}", stem, counter, ext)
        };
        let candidate = folder.join(&new_name);
        if !candidate.exists() {
            break candidate;
        }
    }
}

/// Copy contents and permissions, then carry over access/modification times.
fn copy_preserving(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest)?;
    if let Ok(meta) = fs::metadata(src) {
        let atime = FileTime::from_last_access_time(&meta);
        let mtime = FileTime::from_last_modification_time(&meta);
        filetime::set_file_times(dest, atime, mtime).ok();
    }
    Ok(())
}

/// Rename, or copy + remove when the rename is refused (e.g. across devices).
fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    copy_preserving(src, dest)?;
    if let Err(e) = fs::remove_file(src) {
        // Leave exactly one copy behind
        fs::remove_file(dest).ok();
        return Err(e);
    }
    Ok(())
}

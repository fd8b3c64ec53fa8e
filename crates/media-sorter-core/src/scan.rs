use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::date;
use crate::error::SortError;
use crate::layout::OutputLayout;
use crate::media::MediaFile;
use crate::writer::{Outcome, Transfer};
use crate::{LogSink, RunReport, SortAction, SortEvent};

/// Recursively collect media files under `source`, never entering the output
/// tree. Links to files are collected; links to directories are not followed.
/// Entries that can't be read are logged and skipped.
pub fn collect_media(source: &Path, layout: &OutputLayout) -> Vec<MediaFile> {
    WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !layout.contains(e.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && e.path().is_file()))
        .filter_map(|e| MediaFile::from_path(e.into_path()))
        .collect()
}

/// Drives the per-file pipeline over a source folder:
/// classify, resolve, route, transfer.
pub struct Scanner<'a> {
    source: PathBuf,
    action: SortAction,
    layout: OutputLayout,
    sink: &'a LogSink<'a>,
}

impl<'a> Scanner<'a> {
    /// `source` must be an absolute, normalized directory path.
    pub fn new(source: PathBuf, action: SortAction, sink: &'a LogSink<'a>) -> Self {
        let layout = OutputLayout::for_source(&source);
        Self {
            source,
            action,
            layout,
            sink,
        }
    }

    /// Walk the source folder and sort every media file in it. Per-file
    /// failures never stop the walk. Ends with a `Completed` event.
    pub fn run(&self) -> crate::error::Result<RunReport> {
        self.layout.prepare()?;

        // Collect before transferring so files written during the run are never revisited
        let files = collect_media(&self.source, &self.layout);
        tracing::info!(count = files.len(), source = %self.source.display(), "media files found");

        let transfer = Transfer::new(&self.layout, self.sink);
        let mut report = RunReport {
            files_seen: files.len() as u64,
            ..RunReport::default()
        };

        for mut file in files {
            // An unreadable date routes the file to the quarantine folder
            file.date = match date::resolve_file(&file) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), "cannot resolve date: {e}");
                    None
                }
            };
            match self.sort_file(&file, &transfer) {
                Ok(Outcome::Transferred(_)) => report.transferred += 1,
                Ok(Outcome::Quarantined(_)) => report.quarantined += 1,
                Err(e) => {
                    tracing::error!(path = %file.path.display(), "{e}");
                    (self.sink)(&SortEvent::Skipped {
                        source: file.path.clone(),
                        cause: e.to_string(),
                    });
                    report.failed += 1;
                }
            }
        }

        tracing::info!(?report, "run finished");
        (self.sink)(&SortEvent::Completed(report.clone()));
        Ok(report)
    }

    fn sort_file(&self, file: &MediaFile, transfer: &Transfer) -> Result<Outcome, SortError> {
        match self.layout.route(file.date.map(|d| d.timestamp)) {
            Ok(folder) => transfer.transfer(file, &folder, self.action),
            Err(e) => transfer.quarantine(file, &e.to_string()),
        }
    }
}

pub mod date;
pub mod error;
pub mod layout;
pub mod media;
pub mod scan;
pub mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

pub use date::{DateSource, ResolvedDate};
pub use error::{Result, SortError};
pub use layout::{OutputLayout, OUTPUT_DIR_NAME, QUARANTINE_DIR_NAME};
pub use media::{MediaFile, MediaKind, IMAGE_EXTS, VIDEO_EXTS};

/// Whether sorted files are copied or moved. Chosen once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortAction {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for SortAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Move => "move",
        })
    }
}

/// Everything a run needs, fixed at invocation time.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: PathBuf,
    pub action: SortAction,
}

impl RunConfig {
    pub fn new(source: impl Into<PathBuf>, action: SortAction) -> Self {
        Self {
            source: source.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Media files found outside the output tree
    pub files_seen: u64,
    /// Copied or moved into a month folder
    pub transferred: u64,
    /// Copied into `undated_or_error` after a failure
    pub quarantined: u64,
    /// Even the quarantine copy failed
    pub failed: u64,
}

/// One human-readable progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortEvent {
    Transferred {
        action: SortAction,
        source: PathBuf,
        folder: PathBuf,
    },
    /// The primary transfer failed; a quarantine copy follows.
    Failed { source: PathBuf, cause: String },
    Quarantined { source: PathBuf },
    /// The quarantine copy failed too; the file was left where it was.
    Skipped { source: PathBuf, cause: String },
    Completed(RunReport),
}

impl fmt::Display for SortEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transferred {
                action,
                source,
                folder,
            } => {
                let verb = match action {
                    SortAction::Copy => "Copied",
                    SortAction::Move => "Moved",
                };
                write!(f, "{verb}: {} → {}", source.display(), folder.display())
            }
            Self::Failed { source, cause } => {
                write!(f, "Error processing {}: {cause}", source.display())
            }
            Self::Quarantined { source } => {
                write!(f, "Copied to {QUARANTINE_DIR_NAME}: {}", source.display())
            }
            Self::Skipped { source, cause } => write!(f, "Skipped {}: {cause}", source.display()),
            Self::Completed(_) => f.write_str("✅ Sorting completed!"),
        }
    }
}

/// Receives every progress line of a run, in order.
pub type LogSink<'a> = dyn Fn(&SortEvent) + Send + Sync + 'a;

/// Check that `source` is an existing directory and return its absolute,
/// normalized form.
pub fn validate_source(source: &Path) -> Result<PathBuf> {
    if source.as_os_str().is_empty() || !source.is_dir() {
        return Err(SortError::InvalidSource {
            path: source.to_path_buf(),
        });
    }
    Ok(dunce::canonicalize(source)?)
}

/// Run the full sort on the calling thread, reporting progress to `sink`.
pub fn run(config: RunConfig, sink: &LogSink) -> Result<RunReport> {
    let source = validate_source(&config.source)?;
    tracing::info!(source = %source.display(), action = %config.action, "sorting started");
    scan::Scanner::new(source, config.action, sink).run()
}

/// A run on a background thread.
pub struct RunHandle {
    events: mpsc::Receiver<SortEvent>,
    handle: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Progress lines as they are produced. Ends when the run finishes.
    pub fn events(&self) -> mpsc::Iter<'_, SortEvent> {
        self.events.iter()
    }

    /// Wait for the run to finish.
    pub fn join(self) -> std::thread::Result<Result<RunReport>> {
        self.handle.join()
    }
}

/// Validate the source folder, then run the sort on a worker thread.
/// Progress comes back through [`RunHandle::events`].
pub fn spawn_run(config: RunConfig) -> Result<RunHandle> {
    // Fail fast on a bad folder, before any thread exists
    validate_source(&config.source)?;

    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        let sink = move |event: &SortEvent| {
            // The receiver may have been dropped; the run still completes
            let _ = tx.send(event.clone());
        };
        run(config, &sink)
    });

    Ok(RunHandle { events: rx, handle })
}

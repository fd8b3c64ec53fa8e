use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("not a valid folder: {}", path.display())]
    InvalidSource { path: PathBuf },

    /// The primary transfer failed and so did the fallback copy into the
    /// quarantine folder. `cause` is the primary failure.
    #[error("could not quarantine {}: {source} (after: {cause})", path.display())]
    Quarantine {
        path: PathBuf,
        cause: String,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SortError>;

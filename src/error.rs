use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load a config file.
///
/// Malformed content is never an error; only an unreadable source is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open config file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised by the fixture helpers.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("condition not met within {0:?}")]
    Timeout(Duration),

    #[error("reading snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid color {0:?}: expected RRGGBB or #RRGGBB")]
    InvalidColor(String),

    #[error("invalid screenshot payload: {0}")]
    InvalidImage(String),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("png: {0}")]
    Png(#[from] png::DecodingError),
}

pub type Result<T> = std::result::Result<T, FixtureError>;

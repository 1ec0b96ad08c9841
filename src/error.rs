use thiserror::Error;

/// Tagged failure classes for the expansion pipeline, per the taxonomy in
/// spec.md §7: validation, unsupported, I/O, and parse failures are kept
/// distinct so callers can branch on `matches!(err, Error::Unsupported(_))`
/// instead of sniffing message text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

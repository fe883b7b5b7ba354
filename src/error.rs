use std::fmt;

use camino::Utf8PathBuf;

/// Error types for the dolgeo library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source log is missing or cannot be read.
    #[error("cannot read source file {path}")]
    FileAccess {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A GEO response line could not be turned into an event.
    #[error("extraction failed at line {line}: {kind}")]
    Extraction {
        /// 0-based index of the offending GEO response line.
        line: usize,
        kind: ExtractionErrorKind,
    },

    /// A regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An I/O error occurred while writing a report.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a GEO response line failed extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// No dotted-quad address anywhere on the line.
    MissingAddress,
    /// No `"CountryCode":"` followed by two word characters.
    MissingCountryCode,
    /// The timestamp line would sit before the start of the file.
    TimestampOutOfRange { offset: usize },
    /// The timestamp line has no `": "` delimiter.
    MissingTimestamp { timestamp_line: usize },
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionErrorKind::MissingAddress => write!(f, "no IPv4 address found"),
            ExtractionErrorKind::MissingCountryCode => write!(f, "no country code found"),
            ExtractionErrorKind::TimestampOutOfRange { offset } => {
                write!(f, "timestamp line {offset} lines back precedes the start of the file")
            }
            ExtractionErrorKind::MissingTimestamp { timestamp_line } => {
                write!(f, "line {timestamp_line} has no \": \" timestamp delimiter")
            }
        }
    }
}

impl Error {
    /// The line index carried by an extraction error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Extraction { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;

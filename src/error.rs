//! Error types for xml-weave.

use thiserror::Error;

use crate::path::EvaluationError;

/// Result type alias for xml-weave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during parsing, path evaluation, or merging.
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A path expression could not be evaluated.
    ///
    /// This aborts the merge run that triggered it; no partial result is
    /// produced past the failing merge point.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A merge handler rejected its input.
    #[error("merge handler error: {0}")]
    Handler(String),
}

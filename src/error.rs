//! Error types for the merge pipeline.
//!
//! Parsing failures carry the input they came from plus line/column
//! positions so the caller can point at the offending file and row.
//! Everything else (I/O, writers, configuration, charts) is wrapped in
//! [`PipelineError`].

use crate::InputFormat;
use std::path::PathBuf;
use thiserror::Error;

/// A byte-offset span into the original source text.
///
/// Both `start` and `end` are byte offsets (not character indices) from the
/// beginning of the source string.  `start` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpan {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

impl SourceSpan {
    /// Create a new `SourceSpan`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Field name constants for consistent error reporting.
pub mod fields {
    pub const INDEX: &str = "index";
    pub const AUTHORS: &str = "authors";
    pub const TITLE: &str = "title";
    pub const YEAR: &str = "year";
    pub const AFFILIATION: &str = "affiliation";
    pub const TIMES_CITED: &str = "times_cited";
    pub const DOI: &str = "doi";
    pub const SOURCE_TITLE: &str = "source_title";
    pub const ABSTRACT: &str = "abstract";
    pub const AUTHOR_KEYWORDS: &str = "author_keywords";
    pub const DOCUMENT_TYPE: &str = "document_type";
    pub const PROVENANCE: &str = "provenance";
    pub const QUALITY_RANK: &str = "quality_rank";
}

/// Top-level error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook write error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No dataset available, run the pipeline first")]
    NotProcessed,

    #[cfg(feature = "charts")]
    #[error(transparent)]
    Chart(#[from] crate::charts::ChartError),
}

impl PipelineError {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Parse error with detailed location and context information.
#[derive(Error, Debug)]
#[error("Error in {format} input{}: {error}",
    match (line, column) {
        (Some(l), Some(c)) => format!(" at line {} column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        (None, Some(c)) => format!(" at column {}", c),
        (None, None) => String::new(),
    }
)]
pub struct ParseError {
    /// Line number where the error occurred (1-based, None if not available)
    pub line: Option<usize>,
    /// Column number where the error occurred (1-based, None if not available)
    pub column: Option<usize>,
    /// Byte-offset span into the source text, for rich diagnostic rendering.
    pub span: Option<SourceSpan>,
    /// The input being parsed
    pub format: InputFormat,
    /// The specific error that occurred
    pub error: ValueError,
}

impl ParseError {
    /// Create a new ParseError.
    pub fn new(
        line: Option<usize>,
        column: Option<usize>,
        format: InputFormat,
        error: ValueError,
    ) -> Self {
        Self {
            line,
            column,
            span: None,
            format,
            error,
        }
    }

    /// Attach a byte-offset span to this error, returning `self` (builder style).
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Re-label the input this error belongs to.
    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    /// Create a ParseError with just line information.
    pub fn at_line(line: usize, format: InputFormat, error: ValueError) -> Self {
        Self::new(Some(line), None, format, error)
    }

    /// Create a ParseError without position information.
    pub fn without_position(format: InputFormat, error: ValueError) -> Self {
        Self::new(None, None, format, error)
    }
}

/// Specific value-level errors that can occur during parsing.
#[derive(Error, Debug)]
pub enum ValueError {
    #[error("Bad syntax: {0}")]
    Syntax(String),

    #[error("Missing column for {field} (expected one of: {expected})")]
    MissingColumn {
        field: &'static str,
        expected: String,
    },

    #[error("Bad value for {key}: \"{value}\" ({reason})")]
    BadValue {
        field: &'static str,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Address \"{0}\" has no bracketed author group to extract a country from")]
    MalformedAddress(String),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let (line, column) = if let Some(position) = err.position() {
            (
                Some(position.line() as usize),
                Some(position.byte() as usize),
            )
        } else {
            (None, None)
        };

        ParseError::new(
            line,
            column,
            InputFormat::Scopus,
            ValueError::Syntax(err.to_string()),
        )
    }
}

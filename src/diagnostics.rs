//! Source-annotated error reports using [ariadne].
//!
//! Renders a [`ParseError`] against the export it came from, underlining the
//! offending row. Only compiled with the `diagnostics` Cargo feature:
//!
//! ```toml
//! [dependencies]
//! bibmerge = { version = "0.1", features = ["diagnostics"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bibmerge::{SourceParser, WosParser};
//!
//! let source = std::fs::read_to_string("savedrecs.txt")?;
//! match WosParser::new().parse(&source) {
//!     Ok(records) => println!("Read {} records", records.len()),
//!     Err(e) => eprintln!("{}", e.to_diagnostic("savedrecs.txt", &source)),
//! }
//! ```

use crate::error::ParseError;
use crate::{Record, SourceParser};
use ariadne::{Color, Label, Report, ReportKind, Source};

impl ParseError {
    /// Render this error as an Ariadne report.
    ///
    /// The returned `String` contains ANSI colour codes.
    ///
    /// # Arguments
    ///
    /// * `filename` - Label shown in the report header (e.g. `"scopus.csv"`).
    /// * `source` - The text that was parsed.
    pub fn to_diagnostic(&self, filename: &str, source: &str) -> String {
        let mut buf = Vec::new();

        let primary_range = self.primary_byte_range(source);
        let header_span = (filename, primary_range.clone());

        let report = Report::build(ReportKind::Error, header_span)
            .with_message(format!("{}", self))
            .with_label(
                Label::new((filename, primary_range))
                    .with_message(format!("{}", self.error))
                    .with_color(Color::Red),
            )
            .finish();

        if report
            .write((filename, Source::from(source)), &mut buf)
            .is_err()
        {
            return self.to_string();
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Byte range of `source` the report points at.
    ///
    /// Rows are located by span when one is set, otherwise by line number.
    /// Span offsets mark the start of a row, so the label covers the whole
    /// line that contains them.
    fn primary_byte_range(&self, source: &str) -> std::ops::Range<usize> {
        let line = match (&self.span, self.line) {
            (Some(span), _) => {
                let start = span.start.min(source.len());
                let preceding = source.get(..start).unwrap_or("");
                preceding.matches('\n').count() + 1
            }
            (None, Some(line)) => line,
            (None, None) => return 0..0,
        };

        let line_start: usize = source
            .split_inclusive('\n')
            .take(line.saturating_sub(1))
            .map(str::len)
            .sum();
        let line_len = source
            .lines()
            .nth(line.saturating_sub(1))
            .map_or(0, str::len);
        line_start..line_start + line_len
    }
}

/// Parses an export and, on failure, returns the rendered report instead of
/// the raw [`ParseError`].
pub fn parse_with_diagnostics(
    parser: &dyn SourceParser,
    input: &str,
    filename: &str,
) -> Result<Vec<Record>, String> {
    parser
        .parse(input)
        .map_err(|e| e.to_diagnostic(filename, input))
}

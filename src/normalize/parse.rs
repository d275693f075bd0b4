//! Delimited export parsing.
//!
//! This module handles the low-level reading of an export: header
//! resolution, row iteration and dialect detection.

use crate::error::{ParseError, ValueError};
use crate::normalize::config::{MalformedPolicy, SourceConfig};
use crate::normalize::structure::RawRow;
use csv::{ReaderBuilder, StringRecord};
use tracing::warn;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Parse the content of an export, returning one raw row per data line.
pub fn table_parse<S: AsRef<str>>(
    text: S,
    config: &SourceConfig,
) -> Result<Vec<RawRow>, ParseError> {
    let text = text.as_ref();
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    let format = config.format;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    validate_config(config)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .quote(config.quote)
        .trim(if config.trim {
            csv::Trim::All
        } else {
            csv::Trim::None
        })
        .flexible(config.flexible)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| {
            ParseError::at_line(
                1,
                format,
                ValueError::Syntax(format!("Header parsing error: {}", e)),
            )
        })?
        .iter()
        .map(String::from)
        .collect();

    let columns = resolve_columns(&headers, config, 1)?;

    let mut rows = Vec::new();
    let mut line_number = 2;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(line_number);
                let err = ParseError::at_line(
                    line,
                    format,
                    ValueError::Syntax(format!("Row parsing error: {}", e)),
                );
                match config.malformed {
                    MalformedPolicy::FailFast => return Err(err),
                    MalformedPolicy::Skip => {
                        warn!(source = %format, line, error = %err.error, "Skipping unreadable row");
                        line_number += 1;
                        continue;
                    }
                }
            }
        };

        // Rows can span several physical lines when quoted fields hold newlines.
        if let Some(position) = record.position() {
            line_number = position.line() as usize;
        }

        if is_blank(&record) {
            line_number += 1;
            continue;
        }

        let byte_offset = record.position().map(|p| p.byte() as usize);
        rows.push(RawRow::from_record(&columns, &record, line_number, byte_offset));

        line_number += 1;
    }

    Ok(rows)
}

/// Parse the rows of a worksheet; the first non-blank row holds the headers.
pub fn sheet_parse(
    sheet: Vec<(usize, StringRecord)>,
    config: &SourceConfig,
) -> Result<Vec<RawRow>, ParseError> {
    let mut rows = sheet.into_iter().filter(|(_, record)| !is_blank(record));
    let Some((header_line, headers)) = rows.next() else {
        return Ok(Vec::new());
    };

    validate_config(config)?;

    let headers: Vec<String> = headers.iter().map(String::from).collect();
    let columns = resolve_columns(&headers, config, header_line)?;

    Ok(rows
        .map(|(line, record)| RawRow::from_record(&columns, &record, line, None))
        .collect())
}

fn validate_config(config: &SourceConfig) -> Result<(), ParseError> {
    config.validate().map_err(|msg| {
        ParseError::without_position(
            config.format,
            ValueError::Syntax(format!("Invalid source configuration: {}", msg)),
        )
    })
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|value| value.trim().is_empty())
}

/// Maps every configured field to the first header column carrying one of its aliases.
///
/// A field without any matching column is malformed input unless the
/// configuration is flexible, in which case the field stays unset.
fn resolve_columns(
    headers: &[String],
    config: &SourceConfig,
    header_line: usize,
) -> Result<Vec<(String, usize)>, ParseError> {
    let mut columns: Vec<(String, usize)> = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        if let Some(field) = config.get_field_for_header(header)
            && !columns.iter().any(|(known, _)| known == field)
        {
            columns.push((field.to_string(), i));
        }
    }

    if config.flexible {
        return Ok(columns);
    }

    let mut expected_fields: Vec<&String> = config.header_map.keys().collect();
    expected_fields.sort();

    for field in expected_fields {
        if !columns.iter().any(|(known, _)| known == field) {
            let aliases = config
                .header_map
                .get(field)
                .map(|aliases| aliases.join(", "))
                .unwrap_or_default();
            return Err(ParseError::at_line(
                header_line,
                config.format,
                ValueError::MissingColumn {
                    field: static_field_name(field),
                    expected: aliases,
                },
            ));
        }
    }

    Ok(columns)
}

/// Maps a configured field name onto its constant, for error reporting.
fn static_field_name(field: &str) -> &'static str {
    use crate::error::fields::*;
    [
        AUTHORS,
        TITLE,
        YEAR,
        AFFILIATION,
        TIMES_CITED,
        DOI,
        SOURCE_TITLE,
        ABSTRACT,
        AUTHOR_KEYWORDS,
        DOCUMENT_TYPE,
    ]
    .into_iter()
    .find(|known| *known == field)
    .unwrap_or("custom field")
}

/// Detect the delimiter by analyzing the first non-blank lines of the content.
///
/// A delimiter only counts when it splits every sampled line into the same
/// number of fields, and into more than one.
pub fn detect_delimiter(content: &str) -> u8 {
    let delimiters = [b',', b';', b'\t', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(5)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delimiter in &delimiters {
        let mut score = 0;
        let mut consistent = true;
        let mut expected_fields = None;

        for line in &sample_lines {
            let field_count = line.split(delimiter as char).count();

            if let Some(expected) = expected_fields {
                if field_count != expected {
                    consistent = false;
                    break;
                }
            } else {
                expected_fields = Some(field_count);
            }

            score += field_count;
        }

        if consistent && expected_fields.is_some_and(|n| n > 1) && score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

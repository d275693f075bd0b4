//! Spreadsheet workbook input.
//!
//! Only the first worksheet is read. Every cell is turned into text so the
//! rows go through the same header mapping as delimited exports.

use crate::InputFormat;
use crate::error::{ParseError, ValueError};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use csv::StringRecord;
use std::io::Cursor;
use std::path::Path;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// Whether the file extension names a spreadsheet workbook.
pub(crate) fn is_workbook(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        WORKBOOK_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

/// Reads the first worksheet as `(row number, cells)` pairs.
///
/// Row numbers are 1-based sheet rows, so they match what a spreadsheet
/// program shows.
pub(crate) fn read_rows(
    bytes: &[u8],
    format: InputFormat,
) -> Result<Vec<(usize, StringRecord)>, ParseError> {
    let unreadable = |message: String| {
        ParseError::without_position(
            format,
            ValueError::Syntax(format!("Cannot read workbook: {}", message)),
        )
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| unreadable(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| unreadable(e.to_string()))?,
        None => return Ok(Vec::new()),
    };

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    Ok(range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            let record: StringRecord = cells.iter().map(cell_text).collect();
            (first_row + i + 1, record)
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        // Whole numbers come back as floats from most writers.
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            (*value as i64).to_string()
        }
        other => other.to_string(),
    }
}

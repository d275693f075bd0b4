//! Spreadsheet export and re-import of a processed dataset.
//!
//! The table is written with one header row, as an `.xlsx` workbook or as
//! CSV depending on the file extension. Missing values are written as
//! `No data` and a missing quality rank as `No rank`; both are read back as
//! `None`.

use crate::error::{ParseError, PipelineError, ValueError, fields};
use crate::{InputFormat, MISSING, NO_RANK, Provenance, Record, workbook};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rust_xlsxwriter::{Format, Workbook};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Column headers of the exported table, in order.
pub const HEADERS: [&str; 13] = [
    "Index",
    "Authors",
    "Article Title",
    "Publication Year",
    "Affiliations",
    "Times Cited",
    "DOI",
    "Source Title",
    "Abstract",
    "Author Keywords",
    "Document Type",
    "Source",
    "Quality Rank",
];

/// Columns written as numbers in a workbook.
const NUMERIC_COLUMNS: [usize; 3] = [0, 3, 5];

fn or_missing(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(MISSING)
}

fn record_row(record: &Record) -> [String; 13] {
    [
        record.index.to_string(),
        or_missing(&record.authors).to_string(),
        or_missing(&record.title).to_string(),
        record.year.map_or_else(|| MISSING.to_string(), |y| y.to_string()),
        or_missing(&record.affiliation).to_string(),
        record
            .times_cited
            .map_or_else(|| MISSING.to_string(), |c| c.to_string()),
        or_missing(&record.doi).to_string(),
        or_missing(&record.source_title).to_string(),
        or_missing(&record.abstract_text).to_string(),
        or_missing(&record.author_keywords).to_string(),
        or_missing(&record.document_type).to_string(),
        record.provenance.as_str().to_string(),
        record.quality_rank.as_deref().unwrap_or(NO_RANK).to_string(),
    ]
}

/// Writes the records as a CSV table.
pub fn write_dataset<W: Write>(writer: W, records: &[Record]) -> crate::Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);

    writer.write_record(HEADERS)?;
    for record in records {
        writer.write_record(record_row(record))?;
    }

    writer
        .flush()
        .map_err(|e| PipelineError::Csv(csv::Error::from(e)))?;
    Ok(())
}

/// Builds an `.xlsx` workbook holding the records on one sheet.
pub fn write_workbook(records: &[Record]) -> crate::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Dataset")?;

    for (col, header) in (0u16..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, header, &bold)?;
    }
    for (row, record) in (1u32..).zip(records) {
        for (col, value) in (0u16..).zip(record_row(record)) {
            match value.parse::<u32>() {
                Ok(number) if NUMERIC_COLUMNS.contains(&usize::from(col)) => {
                    sheet.write_number(row, col, number)?;
                }
                _ => {
                    sheet.write_string(row, col, value)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

/// Sibling path the export is staged in before it replaces `path`.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    path.with_file_name(format!(".{}.partial", name))
}

/// Saves the records to `path`, as a workbook when it ends in `.xlsx` and
/// as CSV otherwise.
///
/// The table is staged in a temporary sibling file and renamed into place,
/// so a failed export never leaves a partial file behind.
///
/// # Errors
///
/// Other workbook extensions (`.xls`, `.ods`, ...) cannot be written and
/// give [`PipelineError::Config`].
pub fn save_dataset(path: impl AsRef<Path>, records: &[Record]) -> crate::Result<()> {
    let path = path.as_ref();
    if workbook::is_workbook(path) && !is_xlsx(path) {
        return Err(PipelineError::Config(format!(
            "Cannot write {}: workbooks are only written as .xlsx",
            path.display()
        )));
    }
    let staging = staging_path(path);

    let result = stage(path, &staging, records)
        .and_then(|()| fs::rename(&staging, path).map_err(|e| PipelineError::io(path, e)));

    match result {
        Ok(()) => {
            info!(path = %path.display(), records = records.len(), "Saved dataset");
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&staging);
            error!(path = %path.display(), error = %err, "Export failed");
            Err(err)
        }
    }
}

fn stage(path: &Path, staging: &Path, records: &[Record]) -> crate::Result<()> {
    if is_xlsx(path) {
        let bytes = write_workbook(records)?;
        return fs::write(staging, bytes).map_err(|e| PipelineError::io(staging, e));
    }

    let file = File::create(staging).map_err(|e| PipelineError::io(staging, e))?;
    write_dataset(BufWriter::new(file), records)
}

/// Reads a table written by [`write_dataset`].
pub fn read_dataset<R: Read>(reader: R) -> Result<Vec<Record>, ParseError> {
    let format = InputFormat::Export;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ParseError::from(e).with_format(format))?
        .clone();
    let columns = column_positions(&headers, 1)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| ParseError::from(e).with_format(format))?;
        let line = row.position().map_or(records.len() + 2, |p| p.line() as usize);
        let record = parse_row(&row, &columns)
            .map_err(|e| ParseError::at_line(line, format, e))?;
        records.push(record);
    }

    Ok(records)
}

/// Reads a workbook written by [`write_workbook`].
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Record>, ParseError> {
    let format = InputFormat::Export;
    let mut rows = workbook::read_rows(bytes, format)?.into_iter();
    let (header_line, headers) = rows.next().unwrap_or((1, StringRecord::new()));
    let columns = column_positions(&headers, header_line)?;

    rows.filter(|(_, row)| row.iter().any(|value| !value.trim().is_empty()))
        .map(|(line, row)| {
            parse_row(&row, &columns).map_err(|e| ParseError::at_line(line, format, e))
        })
        .collect()
}

/// Loads a table saved by [`save_dataset`].
pub fn load_dataset(path: impl AsRef<Path>) -> crate::Result<Vec<Record>> {
    let path = path.as_ref();
    let records = if workbook::is_workbook(path) {
        let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        read_workbook(&bytes)?
    } else {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        read_dataset(file)?
    };
    info!(path = %path.display(), records = records.len(), "Loaded dataset");
    Ok(records)
}

/// Position of every exported column in `headers`.
fn column_positions(headers: &StringRecord, line: usize) -> Result<[usize; 13], ParseError> {
    let mut columns = [0usize; 13];
    for (slot, name) in columns.iter_mut().zip(HEADERS) {
        *slot = headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| {
                ParseError::at_line(
                    line,
                    InputFormat::Export,
                    ValueError::MissingColumn {
                        field: header_field(name),
                        expected: name.to_string(),
                    },
                )
            })?;
    }
    Ok(columns)
}

fn header_field(header: &str) -> &'static str {
    match header {
        "Index" => fields::INDEX,
        "Authors" => fields::AUTHORS,
        "Article Title" => fields::TITLE,
        "Publication Year" => fields::YEAR,
        "Affiliations" => fields::AFFILIATION,
        "Times Cited" => fields::TIMES_CITED,
        "DOI" => fields::DOI,
        "Source Title" => fields::SOURCE_TITLE,
        "Abstract" => fields::ABSTRACT,
        "Author Keywords" => fields::AUTHOR_KEYWORDS,
        "Document Type" => fields::DOCUMENT_TYPE,
        "Source" => fields::PROVENANCE,
        _ => fields::QUALITY_RANK,
    }
}

fn parse_row(row: &StringRecord, columns: &[usize; 13]) -> Result<Record, ValueError> {
    let cell = |i: usize| row.get(columns[i]).unwrap_or("").trim();
    let text = |i: usize| {
        let value = cell(i);
        (!value.is_empty() && value != MISSING).then(|| value.to_string())
    };
    let bad_value = |i: usize, field: &'static str, reason: &str| ValueError::BadValue {
        field,
        key: HEADERS[i].to_string(),
        value: cell(i).to_string(),
        reason: reason.to_string(),
    };

    let index = cell(0)
        .parse::<usize>()
        .map_err(|_| bad_value(0, fields::INDEX, "expected a positive integer"))?;
    let year = text(3)
        .map(|v| v.parse::<i32>())
        .transpose()
        .map_err(|_| bad_value(3, fields::YEAR, "expected a year"))?;
    let times_cited = text(5)
        .map(|v| v.parse::<u32>())
        .transpose()
        .map_err(|_| bad_value(5, fields::TIMES_CITED, "expected a citation count"))?;
    let provenance = Provenance::from_label(cell(11))
        .ok_or_else(|| bad_value(11, fields::PROVENANCE, "unknown provenance label"))?;
    let quality_rank = Some(cell(12))
        .filter(|rank| !rank.is_empty() && *rank != NO_RANK)
        .map(String::from);

    Ok(Record {
        index,
        authors: text(1),
        title: text(2),
        year,
        affiliation: text(4),
        times_cited,
        doi: text(6),
        source_title: text(7),
        abstract_text: text(8),
        author_keywords: text(9),
        document_type: text(10),
        provenance,
        quality_rank,
    })
}

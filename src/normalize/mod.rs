//! Schema normalization of the two database exports.
//!
//! Each export is read with its own column mapping and turned into
//! [`Record`]s in the unified schema.
//!
//! # Example
//!
//! ```
//! use bibmerge::{ScopusParser, SourceParser};
//!
//! let input = "\
//! Authors,Title,Year,Affiliations,Cited by,DOI,Source title,Abstract,Author Keywords,Document Type
//! \"Smith J., Doe A.\",an example paper,2022,\"MIT, Cambridge, United States\",5,10.1/ex,Some Journal,,,Article";
//!
//! let records = ScopusParser::new().parse(input).unwrap();
//! assert_eq!(records[0].title.as_deref(), Some("An Example Paper"));
//! assert_eq!(records[0].authors.as_deref(), Some("Smith J."));
//! ```

mod address;
mod config;
mod parse;
mod structure;

use crate::error::ParseError;
use crate::{Record, SourceParser, workbook};
pub use address::{canonical_country, extract_country};
pub use config::{AffiliationRule, MalformedPolicy, SourceConfig};
pub use parse::detect_delimiter;
use parse::{sheet_parse, table_parse};
use std::path::Path;
use structure::RawRow;
use tracing::{debug, info, warn};

/// Contents of an export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceData {
    /// Delimited text (`.csv`, `.txt`, ...)
    Text(String),
    /// Spreadsheet workbook (`.xls`, `.xlsx`, `.ods`, ...)
    Workbook(Vec<u8>),
}

impl SourceData {
    /// Reads a file, as a workbook when its extension names one.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if workbook::is_workbook(path) {
            std::fs::read(path).map(SourceData::Workbook)
        } else {
            std::fs::read_to_string(path).map(SourceData::Text)
        }
    }

    /// Normalizes the contents with `parser`.
    pub fn parse_with(&self, parser: &dyn SourceParser) -> Result<Vec<Record>, ParseError> {
        match self {
            SourceData::Text(text) => parser.parse(text),
            SourceData::Workbook(bytes) => parser.parse_workbook(bytes),
        }
    }
}

/// Normalizes a delimited export with the given configuration.
fn normalize(input: &str, config: &SourceConfig) -> Result<Vec<Record>, ParseError> {
    let config = resolve_dialect(input, config);
    let rows = table_parse(input, &config)?;
    into_records(rows, &config)
}

/// Normalizes the first worksheet of a workbook export.
fn normalize_workbook(bytes: &[u8], config: &SourceConfig) -> Result<Vec<Record>, ParseError> {
    let sheet = workbook::read_rows(bytes, config.format)?;
    let rows = sheet_parse(sheet, config)?;
    into_records(rows, config)
}

fn into_records(rows: Vec<RawRow>, config: &SourceConfig) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let line = row.line_number;
        match row.into_record(config) {
            Ok(record) => records.push(record),
            Err(err) if config.malformed == MalformedPolicy::Skip => {
                warn!(source = %config.format, line, error = %err.error, "Skipping malformed row");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        source = %config.format,
        records = records.len(),
        skipped,
        "Normalized export"
    );
    Ok(records)
}

/// Applies delimiter auto detection when the configuration asks for it.
fn resolve_dialect(input: &str, config: &SourceConfig) -> SourceConfig {
    let mut config = config.clone();

    if config.auto_detect {
        let delimiter = detect_delimiter(input);
        debug!(source = %config.format, delimiter = %(delimiter as char).escape_default(), "Detected delimiter");
        config.delimiter = delimiter;
    }

    config
}

/// Parser for Scopus CSV exports.
///
/// Keeps the first author (text before the first comma), the token after
/// the last comma of the affiliations column, and coerces `Cited by` to an
/// integer.
#[derive(Debug, Clone)]
pub struct ScopusParser {
    config: SourceConfig,
}

impl Default for ScopusParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopusParser {
    /// Creates a new Scopus parser with the default column mapping
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SourceConfig::scopus(),
        }
    }

    /// Creates a new Scopus parser with a custom configuration
    #[must_use]
    pub fn with_config(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Gets a reference to the current configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Gets a mutable reference to the current configuration
    pub fn config_mut(&mut self) -> &mut SourceConfig {
        &mut self.config
    }
}

impl SourceParser for ScopusParser {
    fn parse(&self, input: &str) -> std::result::Result<Vec<Record>, ParseError> {
        normalize(input, &self.config)
    }

    fn parse_workbook(&self, bytes: &[u8]) -> std::result::Result<Vec<Record>, ParseError> {
        normalize_workbook(bytes, &self.config)
    }
}

/// Parser for Web of Science exports, tab-delimited or spreadsheet.
///
/// Keeps the first author (text before the first semicolon) and reduces the
/// addresses column to the country of the first address group.
#[derive(Debug, Clone)]
pub struct WosParser {
    config: SourceConfig,
}

impl Default for WosParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WosParser {
    /// Creates a new Web of Science parser with the default column mapping
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SourceConfig::web_of_science(),
        }
    }

    /// Creates a new Web of Science parser with a custom configuration
    #[must_use]
    pub fn with_config(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Gets a reference to the current configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Gets a mutable reference to the current configuration
    pub fn config_mut(&mut self) -> &mut SourceConfig {
        &mut self.config
    }
}

impl SourceParser for WosParser {
    fn parse(&self, input: &str) -> std::result::Result<Vec<Record>, ParseError> {
        normalize(input, &self.config)
    }

    fn parse_workbook(&self, bytes: &[u8]) -> std::result::Result<Vec<Record>, ParseError> {
        normalize_workbook(bytes, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValueError;
    use crate::{InputFormat, Provenance};
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    const WOS_HEADER: &str = "Authors\tArticle Title\tPublication Year\tAddresses\tCited Reference Count\tDOI\tSource Title\tAbstract\tAuthor Keywords\tDocument Type";

    #[test]
    fn test_parse_scopus() {
        let input = "\
Authors,Title,Year,Affiliations,Cited by,DOI,Source title,Abstract,Author Keywords,Document Type
\"Lopez M., Garcia R.\",robotics in education,2020,\"Tecnologico de Monterrey, Monterrey, Mexico\",7,10.1/a,Computers & Education,Robots help.,Robotics; Education,Article
\"Chen L.\",SOFT GRIPPERS,2019,,,10.1/b,Soft Robotics,,,Review";

        let records = ScopusParser::new().parse(input).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].authors.as_deref(), Some("Lopez M."));
        assert_eq!(records[0].title.as_deref(), Some("Robotics In Education"));
        assert_eq!(records[0].affiliation.as_deref(), Some("Mexico"));
        assert_eq!(records[0].times_cited, Some(7));
        assert_eq!(records[0].author_keywords.as_deref(), Some("Robotics; Education"));
        assert_eq!(records[0].provenance, Provenance::Scopus);

        assert_eq!(records[1].title.as_deref(), Some("Soft Grippers"));
        assert_eq!(records[1].affiliation, None);
        assert_eq!(records[1].times_cited, None);
        assert_eq!(records[1].document_type.as_deref(), Some("Review"));
    }

    #[test]
    fn test_parse_wos_tab_delimited() {
        let input = format!(
            "{}\nLopez, M; Garcia, R\tRobotics in Education\t2020\t[Lopez, M] Tecnol Monterrey, Monterrey 64849, NL, Mexico\t35\t10.1/a\tCOMPUTERS & EDUCATION\tRobots help.\tRobotics\tArticle",
            WOS_HEADER
        );

        let records = WosParser::new().parse(&input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authors.as_deref(), Some("Lopez, M"));
        assert_eq!(records[0].affiliation.as_deref(), Some("Mexico"));
        assert_eq!(records[0].times_cited, Some(35));
        assert_eq!(records[0].year, Some(2020));
        assert_eq!(records[0].provenance, Provenance::WebOfScience);
    }

    #[test]
    fn test_parse_wos_semicolon_delimited_detected() {
        let input = "\
Authors;Article Title;Publication Year;Addresses;Cited Reference Count;DOI;Source Title;Abstract;Author Keywords;Document Type
Wu, H;Swarm Robots;2018;[Wu, H] Zhejiang Univ, Hangzhou, Peoples R China;12;;;;;Article";

        let records = WosParser::new().parse(input).unwrap();
        assert_eq!(records[0].affiliation.as_deref(), Some("China"));
    }

    #[test]
    fn test_parse_wos_malformed_address_fails_fast() {
        let input = format!(
            "{}\nLopez, M\tA\t2020\t[Lopez, M] Univ A, Spain\t1\t\t\t\t\t\nChen, L\tB\t2021\tUniv B, Beijing, China\t2\t\t\t\t\t",
            WOS_HEADER
        );

        let err = WosParser::new().parse(&input).unwrap_err();
        assert_eq!(err.format, InputFormat::WebOfScience);
        assert_eq!(err.line, Some(3));
        assert!(matches!(err.error, ValueError::MalformedAddress(_)));
    }

    #[test]
    fn test_parse_wos_malformed_address_skipped() {
        let input = format!(
            "{}\nLopez, M\tA\t2020\t[Lopez, M] Univ A, Spain\t1\t\t\t\t\t\nChen, L\tB\t2021\tUniv B, Beijing, China\t2\t\t\t\t\t",
            WOS_HEADER
        );

        let mut parser = WosParser::new();
        parser
            .config_mut()
            .set_malformed_policy(MalformedPolicy::Skip);

        let records = parser.parse(&input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].affiliation.as_deref(), Some("Spain"));
    }

    #[test]
    fn test_parse_wos_field_tag_headers() {
        let input = "\
PT\tAU\tTI\tSO\tDT\tDE\tAB\tC1\tNR\tPY\tDI
J\tLopez, M; Garcia, R\tRobotics in Education\tCOMPUTERS & EDUCATION\tArticle\tRobotics; Education\tRobots help.\t[Lopez, M] Tecnol Monterrey, Monterrey 64849, NL, Mexico\t35\t2020\t10.1/a";

        let records = WosParser::new().parse(input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authors.as_deref(), Some("Lopez, M"));
        assert_eq!(records[0].title.as_deref(), Some("Robotics In Education"));
        assert_eq!(records[0].affiliation.as_deref(), Some("Mexico"));
        assert_eq!(records[0].times_cited, Some(35));
        assert_eq!(records[0].year, Some(2020));
        assert_eq!(records[0].doi.as_deref(), Some("10.1/a"));
        assert_eq!(records[0].author_keywords.as_deref(), Some("Robotics; Education"));
    }

    #[test]
    fn test_parse_wos_with_blank_line() {
        let input = format!(
            "{}\nLopez, M\tA\t2020\t[Lopez, M] Univ A, Spain\t1\t\t\t\t\t\n\nChen, L\tB\t2021\t[Chen, L] Univ B, Beijing, China\t2\t\t\t\t\t",
            WOS_HEADER
        );

        let records = WosParser::new().parse(&input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].affiliation.as_deref(), Some("China"));
    }

    fn wos_workbook(rows: &[[&str; 4]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in (0u16..).zip(["Authors", "Article Title", "Publication Year", "Addresses"]) {
            sheet.write_string(0, col, header).unwrap();
        }
        for (row, values) in (1u32..).zip(rows) {
            sheet.write_string(row, 0, values[0]).unwrap();
            sheet.write_string(row, 1, values[1]).unwrap();
            sheet.write_number(row, 2, values[2].parse::<u32>().unwrap()).unwrap();
            sheet.write_string(row, 3, values[3]).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    fn flexible_wos() -> WosParser {
        let mut parser = WosParser::new();
        parser.config_mut().set_flexible(true);
        parser
    }

    #[test]
    fn test_parse_wos_workbook() {
        let bytes = wos_workbook(&[
            ["Lopez, M; Garcia, R", "Robotics in Education", "2020", "[Lopez, M] Tecnol Monterrey, Monterrey, Mexico"],
            ["Smith, J", "Human-Robot Trust", "2022", "[Smith, J] Stanford Univ, Stanford, CA 94305 USA"],
        ]);

        let records = flexible_wos().parse_workbook(&bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].authors.as_deref(), Some("Lopez, M"));
        assert_eq!(records[0].year, Some(2020));
        assert_eq!(records[0].affiliation.as_deref(), Some("Mexico"));
        assert_eq!(records[1].affiliation.as_deref(), Some("United States"));
        assert_eq!(records[1].provenance, Provenance::WebOfScience);
    }

    #[test]
    fn test_parse_wos_workbook_malformed_address_reports_sheet_row() {
        let bytes = wos_workbook(&[
            ["Lopez, M", "A", "2020", "[Lopez, M] Univ A, Spain"],
            ["Chen, L", "B", "2021", "Univ B, Beijing, China"],
        ]);

        let err = flexible_wos().parse_workbook(&bytes).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert_eq!(err.span, None);
        assert!(matches!(err.error, ValueError::MalformedAddress(_)));
    }

    #[test]
    fn test_source_data_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("savedrecs.txt");
        let sheet_path = dir.path().join("savedrecs.xlsx");
        let bytes = wos_workbook(&[["Wu, H", "Swarm Robots", "2018", "[Wu, H] Zhejiang Univ, Hangzhou, Peoples R China"]]);
        std::fs::write(&text_path, "AU\tTI\nWu, H\tSwarm Robots").unwrap();
        std::fs::write(&sheet_path, &bytes).unwrap();

        let text = SourceData::from_path(&text_path).unwrap();
        assert!(matches!(text, SourceData::Text(_)));
        let records = text.parse_with(&flexible_wos()).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("Swarm Robots"));

        let sheet = SourceData::from_path(&sheet_path).unwrap();
        assert_eq!(sheet, SourceData::Workbook(bytes));
        let records = sheet.parse_with(&flexible_wos()).unwrap();
        assert_eq!(records[0].affiliation.as_deref(), Some("China"));
    }

    #[test]
    fn test_parse_unexpected_layout() {
        let err = ScopusParser::new()
            .parse("Name,Value\nfoo,bar")
            .unwrap_err();
        assert!(matches!(err.error, ValueError::MissingColumn { .. }));
    }

    #[test]
    fn test_parse_empty_export() {
        assert!(ScopusParser::new().parse("").unwrap().is_empty());
        assert!(WosParser::new().parse("\n\n").unwrap().is_empty());
    }
}

//! Journal quality ranks from a SCImago-style reference table.
//!
//! The reference table is a semicolon-separated file with one row per
//! venue. Records are enriched by an exact match of their source title
//! against the table's title column.

use crate::error::{ParseError, PipelineError, ValueError, fields};
use crate::{InputFormat, Record};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ranks stored as `-` in the reference table mean the venue is unranked.
const UNRANKED: &str = "-";

/// Layout of the reference ranking file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Location of the ranking file
    pub path: Option<PathBuf>,
    /// Field separator
    pub delimiter: char,
    /// Column holding the venue title
    pub title_column: String,
    /// Column holding the quality label
    pub rank_column: String,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ';',
            title_column: "Title".to_string(),
            rank_column: "SJR Best Quartile".to_string(),
        }
    }
}

impl RankingConfig {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '\n' | '\r') {
            return Err(format!(
                "Ranking delimiter {:?} must be a single ASCII character other than a newline",
                self.delimiter
            ));
        }
        if self.title_column.trim().is_empty() || self.rank_column.trim().is_empty() {
            return Err("Ranking column names cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Venue title to quality label lookup.
///
/// When a title occurs more than once the first row wins, even if its rank
/// is `-`.
#[derive(Debug, Clone, Default)]
pub struct RankingTable {
    ranks: HashMap<String, Option<String>>,
}

impl RankingTable {
    /// Parses the text of a ranking file.
    ///
    /// # Examples
    ///
    /// ```
    /// use bibmerge::{RankingConfig, RankingTable};
    ///
    /// let text = "Rank;Title;SJR Best Quartile\n1;Nature;Q1\n2;Obscure Letters;-";
    /// let table = RankingTable::parse(text, &RankingConfig::default()).unwrap();
    ///
    /// assert_eq!(table.lookup("Nature"), Some("Q1"));
    /// assert_eq!(table.lookup("Obscure Letters"), None);
    /// assert_eq!(table.lookup("Unknown Journal"), None);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the title or rank column is missing or a
    /// row cannot be read.
    pub fn parse(text: &str, config: &RankingConfig) -> Result<Self, ParseError> {
        let format = InputFormat::Ranking;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        config.validate().map_err(|msg| {
            ParseError::without_position(format, ValueError::Syntax(msg))
        })?;

        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(config.delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ParseError::from(e).with_format(format))?
            .clone();

        let column = |name: &str, field: &'static str| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| {
                    ParseError::at_line(
                        1,
                        format,
                        ValueError::MissingColumn {
                            field,
                            expected: name.to_string(),
                        },
                    )
                })
        };
        let title_index = column(&config.title_column, fields::SOURCE_TITLE)?;
        let rank_index = column(&config.rank_column, fields::QUALITY_RANK)?;

        let mut ranks = HashMap::new();
        for result in reader.records() {
            let record = result.map_err(|e| ParseError::from(e).with_format(format))?;

            let Some(title) = record.get(title_index).filter(|t| !t.is_empty()) else {
                continue;
            };
            let rank = record
                .get(rank_index)
                .filter(|rank| !rank.is_empty() && *rank != UNRANKED)
                .map(String::from);

            ranks.entry(title.to_string()).or_insert(rank);
        }

        debug!(venues = ranks.len(), "Parsed ranking table");
        Ok(Self { ranks })
    }

    /// Reads and parses a ranking file.
    pub fn from_path(path: impl AsRef<Path>, config: &RankingConfig) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let table = Self::parse(&text, config)?;
        info!(path = %path.display(), venues = table.len(), "Loaded ranking table");
        Ok(table)
    }

    /// Quality label of a venue, `None` when absent or unranked.
    pub fn lookup(&self, title: &str) -> Option<&str> {
        self.ranks.get(title).and_then(|rank| rank.as_deref())
    }

    /// Number of distinct venues in the table.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Sets the quality rank of every record from its source title.
///
/// Records whose venue is missing or unranked get `None`. Returns the
/// number of ranked records.
pub fn enrich(records: &mut [Record], table: &RankingTable) -> usize {
    let mut ranked = 0;

    for record in records.iter_mut() {
        record.quality_rank = record
            .source_title
            .as_deref()
            .and_then(|title| table.lookup(title))
            .map(String::from);

        match &record.quality_rank {
            Some(_) => ranked += 1,
            None => debug!(index = record.index, venue = ?record.source_title, "No rank"),
        }
    }

    info!(records = records.len(), ranked, "Enriched records with quality ranks");
    ranked
}

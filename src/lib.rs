//! Merge, deduplicate, and rank bibliographic exports from Scopus and Web of Science.
//!
//! `bibmerge` turns two database exports into one normalized record table.
//! It focuses on a faithful normalization of each source's columns, a
//! provenance-aware deduplication over several keys, and a journal quality
//! rank looked up from a SCImago-style reference table.
//!
//! # Features
//!
//! - `regex` - Use the `regex` crate for pattern matching (enabled by default)
//! - `lite` - Use `regex-lite` instead, for smaller binaries
//! - `charts` - Render keyword and citation bar charts with `plotters` (enabled by default)
//! - `cli` - Build the `bibmerge` command line tool (enabled by default)
//! - `diagnostics` - Render parse errors against their source text with `ariadne`
//!
//! # Pipeline
//!
//! 1. **Normalize** each export, delimited text or workbook, into [`Record`]s ([`normalize`])
//! 2. **Merge** the two record sets, Scopus first by default
//! 3. **Deduplicate** by DOI, title, then abstract ([`dedupe`])
//! 4. **Index** the survivors `1..=N`
//! 5. **Enrich** with a quality rank from the reference table ([`rank`])
//!
//! The result can then be exported ([`export`]), aggregated ([`aggregate`]),
//! and charted.
//!
//! # Basic Usage
//!
//! ```rust
//! use bibmerge::{Pipeline, PipelineConfig, Provenance, RankingTable};
//!
//! let scopus = "\
//! Authors,Title,Year,Affiliations,Cited by,DOI,Source title,Abstract,Author Keywords,Document Type
//! \"Smith J., Doe A.\",deep learning for robots,2021,\"MIT, Cambridge, United States\",12,10.1/abc,Robotics Journal,An abstract,AI; Robotics,Article";
//!
//! let wos = "\
//! Authors\tArticle Title\tPublication Year\tAddresses\tCited Reference Count\tDOI\tSource Title\tAbstract\tAuthor Keywords\tDocument Type
//! Smith, J; Doe, A\tDeep Learning for Robots\t2021\t[Smith, J] MIT, Cambridge, MA 02139 USA\t40\t10.1/abc\tRobotics Journal\tAn abstract\tAI\tArticle";
//!
//! let ranking = RankingTable::parse("Title;SJR Best Quartile\nRobotics Journal;Q1", &Default::default()).unwrap();
//!
//! let dataset = Pipeline::new(PipelineConfig::default())
//!     .run(scopus, wos, &ranking)
//!     .unwrap();
//!
//! assert_eq!(dataset.records.len(), 1);
//! assert_eq!(dataset.records[0].provenance, Provenance::Both);
//! assert_eq!(dataset.records[0].quality_rank.as_deref(), Some("Q1"));
//! ```
//!
//! # Missing values
//!
//! Every attribute of a [`Record`] that can be missing is an `Option`. The
//! `No data` placeholder of the exported table only exists at the
//! serialization boundary, see [`export`].


#[cfg(feature = "charts")]
pub mod charts;
pub mod aggregate;
pub mod dedupe;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
#[cfg(feature = "cli")]
pub mod display;
pub mod error;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod rank;

// Reexports
pub use aggregate::{CitationRanking, KeywordFrequency, citation_ranking, keyword_frequency};
pub use dedupe::{DedupKey, Deduplicator, DeduplicatorConfig};
pub use error::{ParseError, PipelineError, Result, SourceSpan, ValueError};
pub use normalize::{ScopusParser, SourceConfig, SourceData, WosParser};
pub use pipeline::{Dataset, MergeOrder, Pipeline, PipelineConfig, Session};
pub use rank::{RankingConfig, RankingTable};

mod regex;
mod utils;
mod workbook;

/// Placeholder written in place of a missing value when records are serialized.
pub const MISSING: &str = "No data";

/// Placeholder written in place of a missing quality rank.
pub const NO_RANK: &str = "No rank";

/// The inputs the pipeline reads, used to label parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Scopus,
    WebOfScience,
    Ranking,
    Export,
}

impl InputFormat {
    /// Convert the format to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Scopus => "Scopus",
            InputFormat::WebOfScience => "Web of Science",
            InputFormat::Ranking => "ranking table",
            InputFormat::Export => "exported table",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which export(s) a record was seen in.
///
/// A record becomes [`Provenance::Both`] as soon as any deduplication key
/// matched another row, even when both rows came from the same export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Provenance {
    #[default]
    Scopus,
    WebOfScience,
    Both,
}

impl Provenance {
    /// Label used in exported tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Scopus => "Scopus",
            Provenance::WebOfScience => "WoS",
            Provenance::Both => "Scopus/WoS",
        }
    }

    /// Parse an exported provenance label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Scopus" => Some(Provenance::Scopus),
            "WoS" => Some(Provenance::WebOfScience),
            "Scopus/WoS" => Some(Provenance::Both),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized publication record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// 1-based position in the processed dataset (0 until indexed)
    pub index: usize,
    /// First author only
    pub authors: Option<String>,
    /// Title-cased article title
    pub title: Option<String>,
    /// Publication year
    pub year: Option<i32>,
    /// Country-level affiliation of the first address
    pub affiliation: Option<String>,
    /// Citation count
    pub times_cited: Option<u32>,
    /// Digital Object Identifier
    pub doi: Option<String>,
    /// Journal or venue name
    pub source_title: Option<String>,
    /// Abstract text
    pub abstract_text: Option<String>,
    /// Semicolon-delimited author keywords
    pub author_keywords: Option<String>,
    /// Document type (Article, Review, ...)
    pub document_type: Option<String>,
    /// Which export(s) contributed the record
    pub provenance: Provenance,
    /// Journal quality label, `None` when unranked
    pub quality_rank: Option<String>,
}

impl Record {
    /// Create an empty record tagged with the given provenance.
    pub fn new(provenance: Provenance) -> Self {
        Self {
            provenance,
            ..Self::default()
        }
    }
}

/// Trait for parsers that turn one source export into normalized records.
pub trait SourceParser {
    /// Parse the full text of an export.
    ///
    /// # Arguments
    ///
    /// * `input` - The exported table as text
    ///
    /// # Returns
    ///
    /// A Result containing the normalized records in file order (unindexed)
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is malformed and the parser is
    /// configured to fail fast
    fn parse(&self, input: &str) -> std::result::Result<Vec<Record>, ParseError>;

    /// Parse the first worksheet of an `.xls`, `.xlsx` or `.ods` export.
    ///
    /// Row numbers in errors are spreadsheet rows (1-based).
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the bytes are not a readable workbook, or the
    /// sheet is malformed and the parser is configured to fail fast
    fn parse_workbook(&self, bytes: &[u8]) -> std::result::Result<Vec<Record>, ParseError>;
}

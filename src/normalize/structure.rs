//! Raw export rows and their conversion into records.
//!
//! This module defines the intermediate row structure produced while
//! reading an export and the source-specific field derivations applied
//! when it becomes a [`Record`].

use crate::error::{ParseError, SourceSpan, fields};
use crate::normalize::address::extract_country;
use crate::normalize::config::{AffiliationRule, SourceConfig};
use crate::utils::{first_author, last_token, non_empty, parse_count, parse_year, title_case};
use crate::{InputFormat, Provenance, Record};
use csv::StringRecord;
use std::collections::HashMap;
use tracing::debug;

/// One data row of an export, keyed by unified field name.
#[derive(Debug, Clone)]
pub(crate) struct RawRow {
    /// Non-empty values of the mapped columns
    pub(crate) fields: HashMap<String, String>,
    /// Line number for error reporting
    pub(crate) line_number: usize,
    /// Byte offset of the row start in the source text, if it came from text
    pub(crate) byte_offset: Option<usize>,
}

impl RawRow {
    /// Create a new RawRow from a record and the resolved column positions.
    pub(crate) fn from_record(
        columns: &[(String, usize)],
        record: &StringRecord,
        line_number: usize,
        byte_offset: Option<usize>,
    ) -> Self {
        let fields = columns
            .iter()
            .filter_map(|(field, i)| {
                record
                    .get(*i)
                    .and_then(non_empty)
                    .map(|value| (field.clone(), value))
            })
            .collect();

        RawRow {
            fields,
            line_number,
            byte_offset,
        }
    }

    /// Get a field value by name.
    pub(crate) fn get_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Convert to a normalized record, applying the derivation rules of the source.
    pub(crate) fn into_record(self, config: &SourceConfig) -> Result<Record, ParseError> {
        let provenance = match config.format {
            InputFormat::WebOfScience => Provenance::WebOfScience,
            _ => Provenance::Scopus,
        };

        let affiliation = match (self.get_field(fields::AFFILIATION), config.affiliation) {
            (None, _) => None,
            (Some(raw), AffiliationRule::LastToken) => last_token(raw, ','),
            (Some(raw), AffiliationRule::AddressCountry) => extract_country(raw).map_err(|e| {
                let err = ParseError::at_line(self.line_number, config.format, e);
                match self.byte_offset {
                    Some(offset) => err.with_span(SourceSpan::new(offset, offset)),
                    None => err,
                }
            })?,
        };

        let times_cited = self.get_field(fields::TIMES_CITED).and_then(|raw| {
            let count = parse_count(raw);
            if count.is_none() {
                debug!(
                    source = %config.format,
                    line = self.line_number,
                    value = raw,
                    "Citation count is not a number"
                );
            }
            count
        });

        let year = self.get_field(fields::YEAR).and_then(parse_year);

        Ok(Record {
            index: 0,
            authors: self
                .get_field(fields::AUTHORS)
                .and_then(|raw| first_author(raw, config.author_delimiter)),
            title: self.get_field(fields::TITLE).map(title_case),
            year,
            affiliation,
            times_cited,
            doi: self.get_field(fields::DOI).map(String::from),
            source_title: self.get_field(fields::SOURCE_TITLE).map(String::from),
            abstract_text: self.get_field(fields::ABSTRACT).map(String::from),
            author_keywords: self.get_field(fields::AUTHOR_KEYWORDS).map(String::from),
            document_type: self.get_field(fields::DOCUMENT_TYPE).map(String::from),
            provenance,
            quality_rank: None,
        })
    }
}

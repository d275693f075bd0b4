//! Key-based deduplication with provenance tracking.
//!
//! Records from both exports are merged into one list and deduplicated by a
//! sequence of exact-match keys (DOI, title, abstract by default). Within
//! each key, every record that shares its value with another record is
//! marked as seen in both exports, then all but the first occurrence are
//! dropped.
//!
//! ## Usage
//!
//! ```rust
//! use bibmerge::dedupe::Deduplicator;
//! use bibmerge::{Provenance, Record};
//!
//! let mut scopus = Record::new(Provenance::Scopus);
//! scopus.doi = Some("10.1234/ml.2023.001".to_string());
//! scopus.title = Some("Machine Learning Basics".to_string());
//!
//! let mut wos = Record::new(Provenance::WebOfScience);
//! wos.doi = Some("10.1234/ml.2023.001".to_string());
//! wos.title = Some("Machine Learning Basics".to_string());
//!
//! let (records, report) = Deduplicator::new().deduplicate(vec![scopus, wos]);
//!
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].provenance, Provenance::Both);
//! assert_eq!(report.total(), 1);
//! ```
//!
//! ## Missing keys
//!
//! By default two records that both lack a key value are considered equal on
//! that key, so only one record without a DOI survives the DOI pass. Set
//! [`MissingKeyPolicy::Ignore`] to let missing values never match.

use crate::Provenance;
use crate::Record;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// A record attribute used as a deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupKey {
    Doi,
    Title,
    Abstract,
}

impl DedupKey {
    /// Name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            DedupKey::Doi => "DOI",
            DedupKey::Title => "title",
            DedupKey::Abstract => "abstract",
        }
    }

    fn value<'a>(&self, record: &'a Record) -> Option<&'a str> {
        match self {
            DedupKey::Doi => record.doi.as_deref(),
            DedupKey::Title => record.title.as_deref(),
            DedupKey::Abstract => record.abstract_text.as_deref(),
        }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How records without a value for the current key are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingKeyPolicy {
    /// Missing values are equal to each other.
    #[default]
    Match,
    /// Missing values never match anything.
    Ignore,
}

/// When provenance is marked relative to row removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvenanceScope {
    /// Mark, then drop, one key at a time.
    #[default]
    PerPass,
    /// Mark every key against the full merged list before dropping anything.
    Merged,
}

/// Configuration options for the deduplication process.
///
/// # Examples
///
/// ```
/// use bibmerge::dedupe::{DedupKey, DeduplicatorConfig, MissingKeyPolicy};
///
/// let config = DeduplicatorConfig {
///     keys: vec![DedupKey::Doi, DedupKey::Title],
///     missing_keys: MissingKeyPolicy::Ignore,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeduplicatorConfig {
    /// Keys applied in order.
    pub keys: Vec<DedupKey>,
    /// Comparison of missing key values.
    pub missing_keys: MissingKeyPolicy,
    /// Whether provenance is marked per pass or up front.
    pub provenance_scope: ProvenanceScope,
}

impl Default for DeduplicatorConfig {
    fn default() -> Self {
        Self {
            keys: vec![DedupKey::Doi, DedupKey::Title, DedupKey::Abstract],
            missing_keys: MissingKeyPolicy::default(),
            provenance_scope: ProvenanceScope::default(),
        }
    }
}

/// Number of rows removed by each key, in pass order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub removed: Vec<(DedupKey, usize)>,
}

impl DedupReport {
    /// Total rows removed over all passes.
    pub fn total(&self) -> usize {
        self.removed.iter().map(|(_, count)| count).sum()
    }

    /// Rows removed by one key.
    pub fn removed_by(&self, key: DedupKey) -> usize {
        self.removed
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, count)| count)
            .sum()
    }
}

/// A record that survives a pass together with the rows it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    /// Key that matched
    pub key: DedupKey,
    /// First occurrence, kept
    pub unique: Record,
    /// Later occurrences, dropped
    pub duplicates: Vec<Record>,
}

/// Exact-match deduplicator over the configured keys.
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    config: DeduplicatorConfig,
}

impl Deduplicator {
    /// Creates a new Deduplicator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the deduplicator with custom settings.
    #[must_use]
    pub fn with_config(mut self, config: DeduplicatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DeduplicatorConfig {
        &self.config
    }

    /// Comparison value of `record` for `key`; the outer `None` means the
    /// record takes no part in matching.
    fn match_value<'a>(&self, key: DedupKey, record: &'a Record) -> Option<Option<&'a str>> {
        match (key.value(record), self.config.missing_keys) {
            (None, MissingKeyPolicy::Ignore) => None,
            (value, _) => Some(value),
        }
    }

    /// Marks every record whose `key` value is shared with another record
    /// as [`Provenance::Both`], returning how many records matched.
    ///
    /// Same-source duplicates are marked too.
    pub fn mark_duplicates(&self, records: &mut [Record], key: DedupKey) -> usize {
        let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
        for record in records.iter() {
            if let Some(value) = self.match_value(key, record) {
                *counts.entry(value).or_default() += 1;
            }
        }

        let shared: HashSet<Option<String>> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(value, _)| value.map(str::to_string))
            .collect();

        let mut marked = 0;
        for record in records.iter_mut() {
            let is_shared = self
                .match_value(key, record)
                .is_some_and(|value| shared.contains(&value.map(str::to_string)));
            if is_shared {
                record.provenance = Provenance::Both;
                marked += 1;
            }
        }

        debug!(key = key.name(), marked, "Marked matching records");
        marked
    }

    /// Drops every record whose `key` value was already seen, keeping the
    /// first occurrence. Returns the number of rows removed.
    fn drop_duplicates(&self, records: &mut Vec<Record>, key: DedupKey) -> usize {
        let before = records.len();
        let mut seen: HashSet<Option<String>> = HashSet::new();

        records.retain(|record| match self.match_value(key, record) {
            None => true,
            Some(value) => seen.insert(value.map(str::to_string)),
        });

        before - records.len()
    }

    /// Deduplicates the merged records, returning the survivors in their
    /// original order and the number of rows removed by each key.
    ///
    /// Running it again on its own output removes nothing.
    pub fn deduplicate(&self, mut records: Vec<Record>) -> (Vec<Record>, DedupReport) {
        let input = records.len();
        let mut report = DedupReport::default();

        if self.config.provenance_scope == ProvenanceScope::Merged {
            for &key in &self.config.keys {
                self.mark_duplicates(&mut records, key);
            }
        }

        for &key in &self.config.keys {
            if self.config.provenance_scope == ProvenanceScope::PerPass {
                self.mark_duplicates(&mut records, key);
            }
            let removed = self.drop_duplicates(&mut records, key);
            info!(key = key.name(), removed, remaining = records.len(), "Deduplication pass");
            report.removed.push((key, removed));
        }

        info!(
            input,
            output = records.len(),
            removed = report.total(),
            "Deduplicated records"
        );
        (records, report)
    }

    /// Reports which rows each pass would drop, without modifying anything.
    ///
    /// Passes run in key order on the rows surviving the previous passes,
    /// exactly as [`Deduplicator::deduplicate`] does.
    pub fn find_duplicates(&self, records: &[Record]) -> Vec<DuplicateGroup> {
        let mut remaining: Vec<&Record> = records.iter().collect();
        let mut groups = Vec::new();

        for &key in &self.config.keys {
            let mut positions: HashMap<Option<&str>, usize> = HashMap::new();
            let mut pass: Vec<DuplicateGroup> = Vec::new();
            let mut survivors = Vec::with_capacity(remaining.len());

            for record in remaining {
                let Some(value) = self.match_value(key, record) else {
                    survivors.push(record);
                    continue;
                };

                match positions.get(&value) {
                    Some(&group) => pass[group].duplicates.push(record.clone()),
                    None => {
                        positions.insert(value, pass.len());
                        pass.push(DuplicateGroup {
                            key,
                            unique: record.clone(),
                            duplicates: Vec::new(),
                        });
                        survivors.push(record);
                    }
                }
            }

            groups.extend(pass.into_iter().filter(|group| !group.duplicates.is_empty()));
            remaining = survivors;
        }

        groups
    }
}

//! Keyword frequency and citation ranking over a dataset.

use crate::{MISSING, Record};
use itertools::Itertools;
use std::collections::HashMap;

/// Occurrence counts of lower-cased author keywords, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFrequency {
    entries: Vec<(String, usize)>,
}

impl KeywordFrequency {
    /// Number of times `keyword` (already lower-cased) occurs.
    pub fn count(&self, keyword: &str) -> usize {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map_or(0, |(_, count)| *count)
    }

    /// All keywords in first-seen order.
    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// All keywords by count descending, ties in first-seen order.
    pub fn sorted(&self) -> Vec<(String, usize)> {
        self.entries
            .iter()
            .cloned()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect()
    }

    /// The `n` most frequent keywords.
    pub fn top(&self, n: usize) -> Vec<(String, usize)> {
        self.sorted().into_iter().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts author keywords over all records.
///
/// Keywords are split on `;`, trimmed and lower-cased. Empty fragments and
/// the missing-value placeholder are not counted, so `"a; b;"` yields two
/// keywords and never an empty one, unlike a plain split-and-count.
///
/// ```
/// use bibmerge::{Provenance, Record, keyword_frequency};
///
/// let record = Record {
///     author_keywords: Some("AI; ai ;Robotics".to_string()),
///     ..Record::new(Provenance::Scopus)
/// };
/// let frequency = keyword_frequency(&[record]);
///
/// assert_eq!(frequency.count("ai"), 2);
/// assert_eq!(frequency.count("robotics"), 1);
/// ```
pub fn keyword_frequency(records: &[Record]) -> KeywordFrequency {
    let missing = MISSING.to_lowercase();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(String, usize)> = Vec::new();

    let keywords = records
        .iter()
        .filter_map(|record| record.author_keywords.as_deref())
        .flat_map(|keywords| keywords.split(';'))
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty() && *keyword != missing);

    for keyword in keywords {
        match positions.get(&keyword) {
            Some(&i) => entries[i].1 += 1,
            None => {
                positions.insert(keyword.clone(), entries.len());
                entries.push((keyword, 1));
            }
        }
    }

    KeywordFrequency { entries }
}

/// `(index, times_cited)` pairs by citation count descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationRanking {
    entries: Vec<(usize, u32)>,
}

impl CitationRanking {
    /// All ranked records.
    pub fn entries(&self) -> &[(usize, u32)] {
        &self.entries
    }

    /// The `n` most cited records.
    pub fn top(&self, n: usize) -> &[(usize, u32)] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ranks records with a known citation count, most cited first.
///
/// Records with equal counts keep their dataset order.
pub fn citation_ranking(records: &[Record]) -> CitationRanking {
    let entries = records
        .iter()
        .filter_map(|record| record.times_cited.map(|count| (record.index, count)))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect();

    CitationRanking { entries }
}

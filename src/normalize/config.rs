//! Source header mapping definitions and configuration.
//!
//! This module defines the default column mappings of each export and the
//! configuration structure used while normalizing it.

use crate::InputFormat;
use crate::error::fields;
use serde::Deserialize;
use std::collections::HashMap;

/// Default column names of a Scopus CSV export
pub(crate) const SCOPUS_HEADERS: &[(&str, &[&str])] = &[
    (fields::AUTHORS, &["Authors"]),
    (fields::TITLE, &["Title"]),
    (fields::YEAR, &["Year"]),
    (fields::AFFILIATION, &["Affiliations"]),
    (fields::TIMES_CITED, &["Cited by"]),
    (fields::DOI, &["DOI"]),
    (fields::SOURCE_TITLE, &["Source title"]),
    (fields::ABSTRACT, &["Abstract"]),
    (fields::AUTHOR_KEYWORDS, &["Author Keywords"]),
    (fields::DOCUMENT_TYPE, &["Document Type"]),
];

/// Default column names of a Web of Science export.
///
/// Spreadsheet exports carry full names, tab-delimited exports the
/// two-letter field tags.
pub(crate) const WOS_HEADERS: &[(&str, &[&str])] = &[
    (fields::AUTHORS, &["Authors", "AU"]),
    (fields::TITLE, &["Article Title", "TI"]),
    (fields::YEAR, &["Publication Year", "PY"]),
    (fields::AFFILIATION, &["Addresses", "C1"]),
    (fields::TIMES_CITED, &["Cited Reference Count", "NR"]),
    (fields::DOI, &["DOI", "DI"]),
    (fields::SOURCE_TITLE, &["Source Title", "SO"]),
    (fields::ABSTRACT, &["Abstract", "AB"]),
    (fields::AUTHOR_KEYWORDS, &["Author Keywords", "DE"]),
    (fields::DOCUMENT_TYPE, &["Document Type", "DT"]),
];

/// How a row that cannot be normalized is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Abort the whole run with the first error.
    #[default]
    FailFast,
    /// Log the row with `warn!` and leave it out.
    Skip,
}

/// How the affiliation column is reduced to a country-level token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliationRule {
    /// Token after the last comma of the raw field.
    LastToken,
    /// Country of the first address group (`[Authors] Org, City, Country; ...`).
    AddressCountry,
}

/// Configuration for normalizing one export.
///
/// Holds the column aliases of every unified field together with the
/// delimited-text dialect and the source-specific derivation rules.
///
/// # Examples
///
/// ```
/// use bibmerge::normalize::{MalformedPolicy, SourceConfig};
///
/// let mut config = SourceConfig::scopus();
/// config
///     .add_header_aliases("times_cited", vec!["Times Cited".to_string()])
///     .set_delimiter(b';')
///     .set_malformed_policy(MalformedPolicy::Skip);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Which export this configuration reads
    pub(crate) format: InputFormat,
    /// Column aliases for every unified field
    pub(crate) header_map: HashMap<String, Vec<String>>,
    /// Reverse lookup map for O(1) header-to-field mapping
    pub(crate) reverse_map: HashMap<String, String>,
    /// Delimiter to use for parsing the export
    pub(crate) delimiter: u8,
    /// Detect the delimiter from the first lines instead of using `delimiter`
    pub(crate) auto_detect: bool,
    /// Quote character
    pub(crate) quote: u8,
    /// Whether to trim whitespace
    pub(crate) trim: bool,
    /// Accept ragged rows and missing columns
    pub(crate) flexible: bool,
    /// Separator between names in the authors column
    pub(crate) author_delimiter: char,
    /// How the affiliation column is reduced
    pub(crate) affiliation: AffiliationRule,
    /// What to do with rows that cannot be normalized
    pub(crate) malformed: MalformedPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::scopus()
    }
}

impl SourceConfig {
    /// Creates the configuration of a Scopus CSV export
    #[must_use]
    pub fn scopus() -> Self {
        let mut config = Self::empty(InputFormat::Scopus);
        config.author_delimiter = ',';
        config.affiliation = AffiliationRule::LastToken;
        config.set_headers(SCOPUS_HEADERS);
        config
    }

    /// Creates the configuration of a Web of Science export
    #[must_use]
    pub fn web_of_science() -> Self {
        let mut config = Self::empty(InputFormat::WebOfScience);
        config.delimiter = b'\t';
        config.auto_detect = true;
        config.author_delimiter = ';';
        config.affiliation = AffiliationRule::AddressCountry;
        config.set_headers(WOS_HEADERS);
        config
    }

    fn empty(format: InputFormat) -> Self {
        Self {
            format,
            header_map: HashMap::new(),
            reverse_map: HashMap::new(),
            delimiter: b',',
            auto_detect: false,
            quote: b'"',
            trim: true,
            flexible: false,
            author_delimiter: ',',
            affiliation: AffiliationRule::LastToken,
            malformed: MalformedPolicy::FailFast,
        }
    }

    fn set_headers(&mut self, headers: &[(&str, &[&str])]) {
        for (field, aliases) in headers {
            self.header_map.insert(
                field.to_string(),
                aliases.iter().map(|s| s.to_string()).collect(),
            );
        }
        self.rebuild_reverse_map();
    }

    /// Rebuild the reverse lookup map after header mappings change
    fn rebuild_reverse_map(&mut self) {
        self.reverse_map.clear();
        for (field, aliases) in &self.header_map {
            for alias in aliases {
                self.reverse_map.insert(alias.to_lowercase(), field.clone());
            }
        }
    }

    /// The export this configuration reads
    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Sets a custom header mapping
    pub fn set_header_mapping(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field.to_string(), aliases);
        self.rebuild_reverse_map();
        self
    }

    /// Adds additional aliases to an existing field mapping
    pub fn add_header_aliases(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map
            .entry(field.to_string())
            .or_default()
            .extend(aliases);
        self.rebuild_reverse_map();
        self
    }

    /// Sets the delimiter character and turns off auto detection
    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self.auto_detect = false;
        self
    }

    /// Sets whether the delimiter is detected from the input
    pub fn set_auto_detect(&mut self, auto_detect: bool) -> &mut Self {
        self.auto_detect = auto_detect;
        self
    }

    /// Sets the quote character
    pub fn set_quote(&mut self, quote: u8) -> &mut Self {
        self.quote = quote;
        self
    }

    /// Sets whether to trim whitespace from fields
    pub fn set_trim(&mut self, trim: bool) -> &mut Self {
        self.trim = trim;
        self
    }

    /// Sets whether to accept ragged rows and missing columns
    pub fn set_flexible(&mut self, flexible: bool) -> &mut Self {
        self.flexible = flexible;
        self
    }

    /// Sets the separator between author names
    pub fn set_author_delimiter(&mut self, delimiter: char) -> &mut Self {
        self.author_delimiter = delimiter;
        self
    }

    /// Sets how rows that cannot be normalized are handled
    pub fn set_malformed_policy(&mut self, policy: MalformedPolicy) -> &mut Self {
        self.malformed = policy;
        self
    }

    /// Finds the field name for a given header using O(1) lookup
    pub(crate) fn get_field_for_header(&self, header: &str) -> Option<&str> {
        let header_lower = header.trim().to_lowercase();
        self.reverse_map.get(&header_lower).map(|s| s.as_str())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.header_map.is_empty() {
            return Err("No header mappings defined".to_string());
        }

        for (field, aliases) in &self.header_map {
            if field.is_empty() {
                return Err("Empty field name found in mappings".to_string());
            }
            if aliases.is_empty() {
                return Err(format!("Field '{}' has no aliases defined", field));
            }
            if aliases.iter().any(|alias| alias.trim().is_empty()) {
                return Err(format!("Empty alias found for field '{}'", field));
            }
        }

        if self.delimiter == b'\n' || self.delimiter == b'\r' {
            return Err("Delimiter cannot be a newline character".to_string());
        }

        let mut all_aliases = HashMap::new();
        for (field, aliases) in &self.header_map {
            for alias in aliases {
                let alias_lower = alias.to_lowercase();
                if let Some(existing_field) = all_aliases.get(&alias_lower)
                    && existing_field != field
                {
                    return Err(format!(
                        "Alias '{}' is mapped to both '{}' and '{}'",
                        alias, existing_field, field
                    ));
                }
                all_aliases.insert(alias_lower, field.clone());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopus_defaults() {
        let config = SourceConfig::scopus();
        assert_eq!(config.format(), InputFormat::Scopus);
        assert_eq!(config.delimiter, b',');
        assert!(!config.auto_detect);
        assert_eq!(config.author_delimiter, ',');
        assert_eq!(config.get_field_for_header("Cited by"), Some(fields::TIMES_CITED));
        assert_eq!(config.get_field_for_header("Source title"), Some(fields::SOURCE_TITLE));
        assert_eq!(config.get_field_for_header("Title"), Some(fields::TITLE));
    }

    #[test]
    fn test_wos_defaults() {
        let config = SourceConfig::web_of_science();
        assert_eq!(config.format(), InputFormat::WebOfScience);
        assert_eq!(config.delimiter, b'\t');
        assert!(config.auto_detect);
        assert_eq!(config.author_delimiter, ';');
        assert_eq!(config.affiliation, AffiliationRule::AddressCountry);
        assert_eq!(config.get_field_for_header("Article Title"), Some(fields::TITLE));
        assert_eq!(
            config.get_field_for_header("Cited Reference Count"),
            Some(fields::TIMES_CITED)
        );
        assert_eq!(config.get_field_for_header("Title"), None);
    }

    #[test]
    fn test_wos_field_tags() {
        let config = SourceConfig::web_of_science();
        assert_eq!(config.get_field_for_header("AU"), Some(fields::AUTHORS));
        assert_eq!(config.get_field_for_header("TI"), Some(fields::TITLE));
        assert_eq!(config.get_field_for_header("C1"), Some(fields::AFFILIATION));
        assert_eq!(config.get_field_for_header("NR"), Some(fields::TIMES_CITED));
        assert_eq!(config.get_field_for_header("DI"), Some(fields::DOI));
        assert_eq!(config.get_field_for_header("PT"), None);
    }

    #[test]
    fn test_get_field_for_header_case_insensitive() {
        let config = SourceConfig::scopus();
        assert_eq!(config.get_field_for_header("SOURCE TITLE"), Some(fields::SOURCE_TITLE));
        assert_eq!(config.get_field_for_header(" doi "), Some(fields::DOI));
    }

    #[test]
    fn test_add_header_aliases() {
        let mut config = SourceConfig::web_of_science();
        config.add_header_aliases(fields::TIMES_CITED, vec!["Times Cited, WoS Core".to_string()]);

        assert_eq!(
            config.get_field_for_header("Cited Reference Count"),
            Some(fields::TIMES_CITED)
        );
        assert_eq!(
            config.get_field_for_header("Times Cited, WoS Core"),
            Some(fields::TIMES_CITED)
        );
    }

    #[test]
    fn test_set_header_mapping_replaces_aliases() {
        let mut config = SourceConfig::scopus();
        config.set_header_mapping(fields::TITLE, vec!["Document Title".to_string()]);

        assert_eq!(config.get_field_for_header("Document Title"), Some(fields::TITLE));
        assert_eq!(config.get_field_for_header("Title"), None);
    }

    #[test]
    fn test_validate_success() {
        assert!(SourceConfig::scopus().validate().is_ok());
        assert!(SourceConfig::web_of_science().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_aliases() {
        let mut config = SourceConfig::scopus();
        config.set_header_mapping(fields::ABSTRACT, vec!["Title".to_string()]);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_alias() {
        let mut config = SourceConfig::scopus();
        config.set_header_mapping(fields::DOI, vec![" ".to_string()]);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_delimiter() {
        let mut config = SourceConfig::scopus();
        config.set_delimiter(b'\n');

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configuration_chaining() {
        let mut config = SourceConfig::web_of_science();
        config
            .set_delimiter(b',')
            .set_quote(b'\'')
            .set_trim(false)
            .set_flexible(true)
            .set_author_delimiter('|')
            .set_malformed_policy(MalformedPolicy::Skip);

        assert_eq!(config.delimiter, b',');
        assert!(!config.auto_detect);
        assert_eq!(config.quote, b'\'');
        assert!(!config.trim);
        assert!(config.flexible);
        assert_eq!(config.author_delimiter, '|');
        assert_eq!(config.malformed, MalformedPolicy::Skip);
    }
}

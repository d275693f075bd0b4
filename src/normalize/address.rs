//! Country extraction from Web of Science address strings.
//!
//! Addresses look like
//! `[Smith, J; Doe, A] Univ Toronto, Dept Comp Sci, Toronto, ON M5S, Canada; [Lee, K] ...`.
//! The country is the last comma-delimited token of the first address group.

use crate::error::ValueError;
use crate::regex::Regex;
use std::sync::LazyLock;

static FIRST_ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\]]*\]([^\];]*)").unwrap());

/// Extracts the country of the first address group.
///
/// Returns `Ok(None)` when the group carries no text after the author
/// bracket, and an error when the address has no bracketed author group at
/// all.
///
/// # Examples
///
/// ```
/// use bibmerge::normalize::extract_country;
///
/// let country = extract_country("[Smith, J] Stanford Univ, Stanford, CA 94305 USA").unwrap();
/// assert_eq!(country.as_deref(), Some("United States"));
/// ```
pub fn extract_country(address: &str) -> Result<Option<String>, ValueError> {
    let captures = FIRST_ADDRESS_REGEX
        .captures(address)
        .ok_or_else(|| ValueError::MalformedAddress(address.to_string()))?;

    Ok(crate::utils::last_token(&captures[1], ',').map(|token| canonical_country(&token)))
}

/// Collapses the country spellings that vary between records.
///
/// Any token mentioning `USA` (state and ZIP prefixes included) becomes
/// `United States`, and any token mentioning `China` becomes `China`.
pub fn canonical_country(token: &str) -> String {
    if token.contains("USA") {
        "United States".to_string()
    } else if token.contains("China") {
        "China".to_string()
    } else {
        token.to_string()
    }
}

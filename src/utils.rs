use crate::regex::Regex;
use std::sync::LazyLock;

static LEADING_YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(?:\.0+)?\b").unwrap());

/// Returns the trimmed value, or `None` when nothing is left.
pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Returns the text before the first `delimiter`, trimmed.
///
/// Used to keep only the first name of an author list.
///
/// # Arguments
///
/// * `authors` - The full author list
/// * `delimiter` - The separator between authors in this export
pub fn first_author(authors: &str, delimiter: char) -> Option<String> {
    authors.split(delimiter).next().and_then(non_empty)
}

/// Returns the trimmed token after the last `delimiter`.
pub fn last_token(value: &str, delimiter: char) -> Option<String> {
    value.rsplit(delimiter).next().and_then(non_empty)
}

/// Title-cases a string: the first letter of every word is upper-cased and
/// the rest lower-cased. Any non-letter character starts a new word, so
/// `"don't stop"` becomes `"Don'T Stop"` and `"3d scans"` becomes `"3D Scans"`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }

    result
}

/// Parses a publication year, accepting a bare integer or a value that
/// starts with a four-digit year (e.g. `"2021.0"` from spreadsheet exports).
pub fn parse_year(year_str: &str) -> Option<i32> {
    let year_str = year_str.trim();

    if year_str.is_empty() {
        return None;
    }

    if let Ok(year) = year_str.parse::<i32>() {
        return Some(year);
    }

    LEADING_YEAR_REGEX
        .captures(year_str)
        .and_then(|captures| captures[1].parse::<i32>().ok())
}

/// Coerces a citation count to an integer.
///
/// Whole-number floats (`"12.0"`) are accepted; anything else yields `None`.
pub fn parse_count(count_str: &str) -> Option<u32> {
    let count_str = count_str.trim();

    if count_str.is_empty() {
        return None;
    }

    if let Ok(count) = count_str.parse::<u32>() {
        return Some(count);
    }

    count_str
        .parse::<f64>()
        .ok()
        .filter(|value| value.fract() == 0.0 && *value >= 0.0 && *value <= f64::from(u32::MAX))
        .map(|value| value as u32)
}

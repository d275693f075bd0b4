//! Regex backend selection.
//!
//! The full `regex` crate is used by default; the `lite` feature swaps in
//! `regex-lite` for smaller builds. Both expose the same `Regex` API for the
//! patterns used in this crate.

#[cfg(feature = "regex")]
pub(crate) use ::regex::Regex;

#[cfg(all(feature = "lite", not(feature = "regex")))]
pub(crate) use ::regex_lite::Regex;

#[cfg(not(any(feature = "regex", feature = "lite")))]
compile_error!("either the `regex` or the `lite` feature must be enabled");

//! Text normalizer shared by the classifier, the risk engine and the matcher.
//!
//! Every function here is total over its input: amounts fail with a
//! `NormalizeError` the caller turns into a soft extraction failure, and
//! timestamps fall back to the wall clock with a warning.

use crate::{
    error::NormalizeError,
    types::{Amount, Timestamp},
};
use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// Layouts tried in order by `parse_timestamp`.
pub const TIMESTAMP_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Prefixes a payer commonly types in front of the code itself.
const REFERENCE_PREFIXES: &[&str] = &["txid", "id"];

/// Reference-shaped cues, most specific first. Shared by the classifier's
/// fallback and the matcher's candidate reference extraction.
const REFERENCE_CUE_PATTERNS: &[&str] = &[
    r"(?i)TxId:\s*(\d+)",
    r"(?i)Transaction Id:\s*(\d+)",
    r"(?i)Financial Transaction Id:\s*(\d+)",
    r"(?i)\*162\*TxId:(\d+)",
    r"(?i)External Transaction Id:\s*(\S+)",
    r"(?i)Id:\s*(\d+)",
];

static REFERENCE_CUES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REFERENCE_CUE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("reference cue pattern is valid"))
        .collect()
});

/// Strip thousands separators and surrounding whitespace, then parse.
pub fn normalize_amount(text: &str) -> Result<Amount, NormalizeError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(NormalizeError::Format(text.to_string()));
    }
    Amount::from_str(&cleaned).map_err(|_| NormalizeError::Format(text.to_string()))
}

/// Canonical form of a reference code: lower-case ASCII alphanumerics with
/// any leading "txid"/"id" prefix removed. Idempotent.
pub fn normalize_reference(code: &str) -> String {
    let mut normalized: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    // Repeat so the output can never itself start with a prefix.
    while let Some(prefix) = REFERENCE_PREFIXES
        .iter()
        .find(|p| normalized.starts_with(**p))
    {
        normalized.replace_range(..prefix.len(), "");
    }
    normalized
}

/// Years a notification can plausibly carry. Anything outside is treated as
/// unparseable so later window arithmetic stays far from the chrono limits.
const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 1970..=9999;

/// Parse against `TIMESTAMP_LAYOUTS` in order.
pub fn try_parse_timestamp(text: &str) -> Result<Timestamp, NormalizeError> {
    let trimmed = text.trim();
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(trimmed, layout).ok())
        .filter(|ts| TIMESTAMP_YEARS.contains(&ts.year()))
        .ok_or_else(|| NormalizeError::TimestampUnparseable(text.to_string()))
}

/// Result of a lenient timestamp parse.
#[derive(Debug, Clone, PartialEq)]
pub struct LenientTimestamp {
    pub value: Timestamp,
    /// Set when every layout failed and `value` is the wall clock.
    pub warning: Option<NormalizeError>,
}

/// Parse a notification timestamp. On total failure returns the current
/// local time and a soft warning instead of an error.
pub fn parse_timestamp(text: &str) -> LenientTimestamp {
    match try_parse_timestamp(text) {
        Ok(value) => LenientTimestamp { value, warning: None },
        Err(e) => {
            log::warn!("normalize: {e}, falling back to current time");
            LenientTimestamp {
                value: chrono::Local::now().naive_local(),
                warning: Some(e),
            }
        }
    }
}

/// First reference-shaped cue found anywhere in `text`, raw (not normalized).
pub fn find_reference(text: &str) -> Option<String> {
    REFERENCE_CUES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every reference-shaped cue in `text`, normalized, de-duplicated, in cue order.
pub fn all_references(text: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for re in REFERENCE_CUES.iter() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let normalized = normalize_reference(m.as_str());
                if !normalized.is_empty() && !refs.contains(&normalized) {
                    refs.push(normalized);
                }
            }
        }
    }
    refs
}

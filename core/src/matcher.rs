//! Reference matcher.
//!
//! Finds the transaction a customer-supplied reference code points at.
//! Strategies are tried strictly in order and the first hit wins:
//!   1. Exact         normalized code equals a candidate reference
//!   2. Fuzzy         best similarity >= fuzzy_min_similarity
//!   3. TimeProximity blend of time closeness and similarity, needs a time
//!
//! `ReferenceMatcher::find` never reads the clock: time-based matching only
//! runs when the caller supplies the verification time. The free
//! `match_reference` fills in the current local time when none is given.

use crate::{
    config::MatcherConfig,
    normalize::normalize_reference,
    record::TransactionRecord,
    types::Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    High,
    Medium,
    TimeBased,
    NoMatch,
    NoInput,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact     => "exact",
            MatchType::High      => "high",
            MatchType::Medium    => "medium",
            MatchType::TimeBased => "time_based",
            MatchType::NoMatch   => "no_match",
            MatchType::NoInput   => "no_input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    pub matched: bool,
    pub confidence: f64,
    pub record: Option<&'a TransactionRecord>,
    pub match_type: MatchType,
    pub details: String,
}

impl<'a> MatchResult<'a> {
    fn hit(record: &'a TransactionRecord, confidence: f64, match_type: MatchType, details: String) -> Self {
        Self {
            matched: true,
            confidence,
            record: Some(record),
            match_type,
            details,
        }
    }

    fn miss(match_type: MatchType, details: String) -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            record: None,
            match_type,
            details,
        }
    }
}

/// The code being looked up.
pub struct MatchQuery<'q> {
    pub code: &'q str,
    pub normalized: String,
    pub at: Option<Timestamp>,
}

/// A candidate record with its normalized references precomputed.
pub struct Candidate<'a> {
    pub record: &'a TransactionRecord,
    pub references: Vec<String>,
}

impl<'a> Candidate<'a> {
    pub fn new(record: &'a TransactionRecord) -> Self {
        Self {
            record,
            references: record.candidate_references(),
        }
    }

    /// Best similarity between `normalized` and any of this candidate's
    /// references.
    fn best_similarity(&self, normalized: &str) -> f64 {
        self.references
            .iter()
            .map(|r| similarity(normalized, r))
            .fold(0.0, f64::max)
    }
}

/// Symmetric similarity in [0, 1]; 0.0 if either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// One matching tier.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt<'a>(&self, query: &MatchQuery<'_>, candidates: &[Candidate<'a>]) -> Option<MatchResult<'a>>;
}

// ── Exact ─────────────────────────────────────────────────────────────────

pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn attempt<'a>(&self, query: &MatchQuery<'_>, candidates: &[Candidate<'a>]) -> Option<MatchResult<'a>> {
        let hit = candidates
            .iter()
            .find(|c| c.references.iter().any(|r| *r == query.normalized))?;
        Some(MatchResult::hit(
            hit.record,
            1.0,
            MatchType::Exact,
            format!("Exact match found for TxID: {}", query.code),
        ))
    }
}

// ── Fuzzy ─────────────────────────────────────────────────────────────────

pub struct FuzzyStrategy {
    pub min_similarity: f64,
    pub high_similarity: f64,
}

impl MatchStrategy for FuzzyStrategy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn attempt<'a>(&self, query: &MatchQuery<'_>, candidates: &[Candidate<'a>]) -> Option<MatchResult<'a>> {
        let mut best: Option<(&Candidate<'a>, f64)> = None;
        for candidate in candidates {
            let score = candidate.best_similarity(&query.normalized);
            // Strictly greater: the earliest candidate wins ties.
            if score >= self.min_similarity && best.map_or(true, |(_, b)| score > b) {
                best = Some((candidate, score));
            }
        }
        let (candidate, confidence) = best?;
        let match_type = if confidence >= self.high_similarity {
            MatchType::High
        } else {
            MatchType::Medium
        };
        Some(MatchResult::hit(
            candidate.record,
            confidence,
            match_type,
            format!("Fuzzy match found with {:.2}% confidence", confidence * 100.0),
        ))
    }
}

// ── Time proximity ────────────────────────────────────────────────────────

pub struct TimeProximityStrategy {
    pub window_minutes: i64,
    pub time_weight: f64,
    pub similarity_weight: f64,
    pub min_confidence: f64,
}

impl MatchStrategy for TimeProximityStrategy {
    fn name(&self) -> &'static str {
        "time_proximity"
    }

    fn attempt<'a>(&self, query: &MatchQuery<'_>, candidates: &[Candidate<'a>]) -> Option<MatchResult<'a>> {
        let at = query.at?;
        let window = self.window_minutes as f64;

        let mut ranked: Vec<(&Candidate<'a>, f64, f64)> = candidates
            .iter()
            .filter_map(|c| {
                let minutes = (c.record.occurred_at - at).num_seconds().abs() as f64 / 60.0;
                if minutes > window {
                    return None;
                }
                let time_confidence = (1.0 - minutes / window).max(0.0);
                let blended = self.time_weight * time_confidence
                    + self.similarity_weight * c.best_similarity(&query.normalized);
                Some((c, blended, minutes))
            })
            .collect();

        // Highest confidence first, then the closest in time.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.total_cmp(&b.2)));

        let (candidate, confidence, minutes) = ranked.into_iter().next()?;
        if confidence < self.min_confidence {
            return None;
        }
        Some(MatchResult::hit(
            candidate.record,
            confidence,
            MatchType::TimeBased,
            format!(
                "Time-based match found {minutes:.1} minutes away with {:.2}% confidence",
                confidence * 100.0
            ),
        ))
    }
}

// ── Matcher ───────────────────────────────────────────────────────────────

pub struct ReferenceMatcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for ReferenceMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl ReferenceMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(ExactStrategy),
                Box::new(FuzzyStrategy {
                    min_similarity: config.fuzzy_min_similarity,
                    high_similarity: config.fuzzy_high_similarity,
                }),
                Box::new(TimeProximityStrategy {
                    window_minutes: config.time_window_minutes,
                    time_weight: config.time_weight,
                    similarity_weight: config.similarity_weight,
                    min_confidence: config.time_min_confidence,
                }),
            ],
        }
    }

    pub fn find<'a>(
        &self,
        code: &str,
        records: &'a [TransactionRecord],
        at: Option<Timestamp>,
    ) -> MatchResult<'a> {
        let normalized = normalize_reference(code);
        if normalized.is_empty() || records.is_empty() {
            return MatchResult::miss(
                MatchType::NoInput,
                "No TxID provided or no transactions to search".into(),
            );
        }

        let query = MatchQuery { code, normalized, at };
        let candidates: Vec<Candidate<'a>> = records.iter().map(Candidate::new).collect();

        for strategy in &self.strategies {
            if let Some(result) = strategy.attempt(&query, &candidates) {
                log::info!(
                    "matcher: {} match for '{}' confidence={:.2}",
                    strategy.name(),
                    code,
                    result.confidence
                );
                return result;
            }
        }

        log::debug!("matcher: no match for '{code}' among {} candidates", records.len());
        MatchResult::miss(
            MatchType::NoMatch,
            format!("No suitable match found for TxID: {code}"),
        )
    }
}

/// Match with the default configuration, verifying at `at` or, when absent,
/// at the current local time.
pub fn match_reference<'a>(
    code: &str,
    candidates: &'a [TransactionRecord],
    at: Option<Timestamp>,
) -> MatchResult<'a> {
    let at = at.unwrap_or_else(|| chrono::Local::now().naive_local());
    ReferenceMatcher::default().find(code, candidates, Some(at))
}

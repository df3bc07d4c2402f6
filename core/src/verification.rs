//! Detail verification of a reference match.
//!
//! Starts from the match confidence and applies penalties for each issue
//! found. Any issue vetoes verification, whatever the final score.

use crate::{
    config::VerificationConfig,
    matcher::{MatchResult, MatchType},
    notification::Category,
    record::TransactionRecord,
    types::{Amount, Timestamp},
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub reference_id: Option<String>,
    pub amount: Amount,
    pub occurred_at: Timestamp,
    pub category: Category,
    pub counterparty_name: Option<String>,
}

impl From<&TransactionRecord> for TransactionSummary {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            reference_id: record.reference_id.clone(),
            amount: record.amount,
            occurred_at: record.occurred_at,
            category: record.category,
            counterparty_name: record.counterparty_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    /// Set only when there was no match to verify.
    pub reason: Option<String>,
    pub matched: bool,
    pub match_confidence: f64,
    pub transaction: Option<TransactionSummary>,
}

/// What the service layer returns for one verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub reference: String,
    pub match_found: bool,
    pub match_confidence: f64,
    pub match_type: MatchType,
    pub match_details: String,
    pub verification_passed: bool,
    pub verification_confidence: f64,
    pub issues: Vec<String>,
    pub transaction: Option<TransactionSummary>,
    pub recommendation: String,
}

pub struct Verifier {
    config: VerificationConfig,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerificationConfig::default())
    }
}

impl Verifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    /// Verify against an explicit "now", used for the age check.
    pub fn verify_at(
        &self,
        found: &MatchResult<'_>,
        expected_amount: Option<Amount>,
        now: Timestamp,
    ) -> VerificationOutcome {
        let record = match (found.matched, found.record) {
            (true, Some(record)) => record,
            _ => {
                return VerificationOutcome {
                    verified: false,
                    confidence: 0.0,
                    issues: Vec::new(),
                    reason: Some("No transaction match found".into()),
                    matched: false,
                    match_confidence: found.confidence,
                    transaction: None,
                }
            }
        };

        let cfg = &self.config;
        let mut score = found.confidence;
        let mut issues = Vec::new();

        if let Some(expected) = expected_amount {
            // A difference too large to represent is a mismatch.
            let diff = record
                .amount
                .checked_sub(expected)
                .and_then(|d| d.abs().to_f64())
                .unwrap_or(f64::MAX);
            if diff > cfg.amount_tolerance {
                issues.push(format!(
                    "Amount mismatch: expected {expected}, found {}",
                    record.amount
                ));
                score *= cfg.amount_mismatch_factor;
            }
        }

        let age_hours = (now - record.occurred_at).num_seconds() as f64 / 3600.0;
        if age_hours > cfg.max_age_hours as f64 {
            issues.push(format!("Transaction is {age_hours:.1} hours old"));
            score *= cfg.stale_factor;
        }

        if record.category.is_incoming() {
            issues.push(format!(
                "Transaction type '{}' might not be a customer payment",
                record.category
            ));
            score *= cfg.incoming_factor;
        }

        VerificationOutcome {
            verified: score >= cfg.verified_min_confidence && issues.is_empty(),
            confidence: score,
            issues,
            reason: None,
            matched: true,
            match_confidence: found.confidence,
            transaction: Some(TransactionSummary::from(record)),
        }
    }

    pub fn verify(&self, found: &MatchResult<'_>, expected_amount: Option<Amount>) -> VerificationOutcome {
        self.verify_at(found, expected_amount, chrono::Local::now().naive_local())
    }

    pub fn recommendation(&self, outcome: &VerificationOutcome) -> String {
        if !outcome.matched {
            return "Transaction not found - request customer to check TxID or try again later".into();
        }
        if outcome.verified {
            return if outcome.match_confidence >= self.config.proceed_min_confidence {
                "Payment verified successfully - proceed with order".into()
            } else {
                "Payment likely verified - proceed with caution".into()
            };
        }
        if outcome.issues.is_empty() {
            "Verification failed - manual review recommended".into()
        } else {
            let head: Vec<&str> = outcome.issues.iter().take(2).map(String::as_str).collect();
            format!("Verification failed: {}", head.join("; "))
        }
    }

    pub fn report(
        &self,
        reference: &str,
        found: &MatchResult<'_>,
        outcome: &VerificationOutcome,
    ) -> VerificationReport {
        VerificationReport {
            reference: reference.to_string(),
            match_found: found.matched,
            match_confidence: found.confidence,
            match_type: found.match_type,
            match_details: found.details.clone(),
            verification_passed: outcome.verified,
            verification_confidence: outcome.confidence,
            issues: outcome.issues.clone(),
            transaction: outcome.transaction.clone(),
            recommendation: self.recommendation(outcome),
        }
    }
}

/// Verify with the default configuration, against the local clock.
pub fn verify(found: &MatchResult<'_>, expected_amount: Option<Amount>) -> VerificationOutcome {
    Verifier::default().verify(found, expected_amount)
}

/// Verify with the default configuration, against an explicit "now".
pub fn verify_at(
    found: &MatchResult<'_>,
    expected_amount: Option<Amount>,
    now: Timestamp,
) -> VerificationOutcome {
    Verifier::default().verify_at(found, expected_amount, now)
}

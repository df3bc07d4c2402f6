//! Risk check trait and the standard check bank.
//!
//! RULE: Every check implements RiskCheck.
//! Checks are independent: each reads the context and returns at most one
//! alert. The engine runs all of them, in registration order, and the
//! order never changes the aggregated score.

use crate::{
    config::CheckWeights,
    notification::ParsedTransaction,
    record::TransactionRecord,
    risk::{Alert, AlertKind, Severity},
    types::{Amount, Timestamp},
};
use chrono::{Duration, Timelike};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use std::sync::LazyLock;

/// What a check gets to look at.
pub struct RiskContext<'a> {
    pub txn: &'a ParsedTransaction,
    /// Same-holder history for amount and velocity comparisons.
    pub history: &'a [TransactionRecord],
    /// Transactions already on file, for duplicate detection.
    pub existing: &'a [TransactionRecord],
}

impl RiskContext<'_> {
    fn amount(&self) -> Option<Amount> {
        self.txn.amount()
    }

    fn occurred_at(&self) -> Option<Timestamp> {
        self.txn.occurred_at()
    }
}

/// The contract every check must fulfill.
pub trait RiskCheck: Send + Sync {
    /// Unique stable name for this check.
    fn name(&self) -> &'static str;

    /// Returns `None` when the check finds nothing.
    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert>;
}

fn to_f64(value: Amount) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// ── Duplicate reference ───────────────────────────────────────────────────

pub struct DuplicateReference {
    pub score: f64,
}

impl RiskCheck for DuplicateReference {
    fn name(&self) -> &'static str {
        "duplicate_reference"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let reference = ctx.txn.reference_id.as_deref().filter(|r| !r.is_empty())?;
        let count = ctx
            .existing
            .iter()
            .filter(|r| r.reference_id.as_deref() == Some(reference))
            .count();
        if count <= 1 {
            return None;
        }
        Some(Alert::new(
            AlertKind::DuplicateReference,
            self.score,
            Severity::Critical,
            format!("Transaction ID {reference} appears {count} times"),
        ))
    }
}

// ── Unusual amount ────────────────────────────────────────────────────────

pub struct UnusualAmount {
    pub cap: f64,
    pub divisor: f64,
    pub mean_multiple: f64,
    pub max_multiple: f64,
    /// Scores above this are High, otherwise Medium.
    pub high_above: f64,
}

impl RiskCheck for UnusualAmount {
    fn name(&self) -> &'static str {
        "unusual_amount"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let amount = to_f64(ctx.amount()?);
        if amount <= 0.0 {
            return None;
        }
        let amounts: Vec<f64> = ctx
            .history
            .iter()
            .map(|r| to_f64(r.amount))
            .filter(|a| *a > 0.0)
            .collect();
        if amounts.is_empty() {
            return None;
        }

        let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
        let max = amounts.iter().copied().fold(f64::MIN, f64::max);
        if amount <= mean * self.mean_multiple && amount <= max * self.max_multiple {
            return None;
        }

        let ratio = amount / mean;
        let score = (ratio / self.divisor).min(self.cap);
        let severity = if score > self.high_above {
            Severity::High
        } else {
            Severity::Medium
        };
        Some(Alert::new(
            AlertKind::UnusualAmount,
            score,
            severity,
            format!("Amount {amount} RWF is {ratio:.1}x higher than average ({mean:.0} RWF)"),
        ))
    }
}

// ── Rapid transactions ────────────────────────────────────────────────────

pub struct RapidTransactions {
    pub window: Duration,
    pub min_count: usize,
    pub per_txn: f64,
    pub cap: f64,
}

impl RiskCheck for RapidTransactions {
    fn name(&self) -> &'static str {
        "rapid_transactions"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let at = ctx.occurred_at()?;
        // None when the window reaches past the earliest representable time.
        let since = at.checked_sub_signed(self.window);
        let count = ctx
            .history
            .iter()
            .filter(|r| since.map_or(true, |s| r.occurred_at > s) && r.occurred_at <= at)
            .count();
        if count < self.min_count {
            return None;
        }
        Some(Alert::new(
            AlertKind::RapidTransactions,
            (count as f64 * self.per_txn).min(self.cap),
            Severity::High,
            format!(
                "{count} transactions in the last {} minutes",
                self.window.num_minutes()
            ),
        ))
    }
}

// ── Suspicious timing ─────────────────────────────────────────────────────

pub struct SuspiciousTiming {
    pub score: f64,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl RiskCheck for SuspiciousTiming {
    fn name(&self) -> &'static str {
        "suspicious_timing"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let hour = ctx.occurred_at()?.hour();
        if !(self.start_hour..=self.end_hour).contains(&hour) {
            return None;
        }
        Some(Alert::new(
            AlertKind::SuspiciousTiming,
            self.score,
            Severity::Medium,
            format!("Transaction at {hour}:00 (late night)"),
        ))
    }
}

// ── Amount pattern ────────────────────────────────────────────────────────

pub struct AmountPattern {
    pub round_score: f64,
    pub round_minimum: Amount,
    pub round_step: Amount,
    pub test_score: f64,
    pub test_amounts: Vec<Amount>,
}

impl RiskCheck for AmountPattern {
    fn name(&self) -> &'static str {
        "amount_pattern"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let amount = ctx.amount()?;
        if amount >= self.round_minimum
            && !self.round_step.is_zero()
            && (amount % self.round_step).is_zero()
        {
            return Some(Alert::new(
                AlertKind::AmountPattern,
                self.round_score,
                Severity::Medium,
                format!("Large round number amount: {amount} RWF"),
            ));
        }
        if self.test_amounts.contains(&amount) {
            return Some(Alert::new(
                AlertKind::AmountPattern,
                self.test_score,
                Severity::Low,
                format!("Potentially test amount: {amount} RWF"),
            ));
        }
        None
    }
}

// ── Balance consistency ───────────────────────────────────────────────────

pub struct BalanceConsistency {
    pub score: f64,
}

impl RiskCheck for BalanceConsistency {
    fn name(&self) -> &'static str {
        "balance_consistency"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        if !ctx.txn.category.is_outgoing() {
            return None;
        }
        let balance = ctx.txn.new_balance()?;
        if balance >= Amount::ZERO {
            return None;
        }
        Some(Alert::new(
            AlertKind::BalanceInconsistency,
            self.score,
            Severity::Critical,
            format!("Negative balance after {}: {balance} RWF", ctx.txn.category),
        ))
    }
}

// ── Message tampering ─────────────────────────────────────────────────────

/// Characters outside what genuine notifications use.
static UNUSUAL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s\-\.\*:#(),]+").expect("valid unusual-character pattern")
});

static EXCESS_DECIMALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d{3,}").expect("valid decimal pattern"));

/// The currency marker printed twice with nothing but separators between.
static DOUBLED_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RWF[\s.,]*RWF").expect("valid currency pattern"));

pub struct MessageTampering {
    pub score: f64,
}

impl RiskCheck for MessageTampering {
    fn name(&self) -> &'static str {
        "message_tampering"
    }

    fn evaluate(&self, ctx: &RiskContext<'_>) -> Option<Alert> {
        let shapes: [(&Regex, &str); 3] = [
            (&UNUSUAL_CHARACTERS, "unusual characters"),
            (&EXCESS_DECIMALS, "too many decimal places"),
            (&DOUBLED_CURRENCY, "repeated currency marker"),
        ];
        let (pattern, label) = shapes
            .into_iter()
            .find(|(pattern, _)| pattern.is_match(&ctx.txn.raw_text))?;
        let sample = pattern
            .find(&ctx.txn.raw_text)
            .map(|m| m.as_str())
            .unwrap_or_default();
        Some(Alert::new(
            AlertKind::MessageTampering,
            self.score,
            Severity::High,
            format!("Suspicious pattern in message: {label} ('{sample}')"),
        ))
    }
}

/// The standard bank, in the order the engine registers it.
pub fn standard_checks(weights: &CheckWeights, high_threshold: f64) -> Vec<Box<dyn RiskCheck>> {
    vec![
        Box::new(DuplicateReference {
            score: weights.duplicate_reference,
        }),
        Box::new(UnusualAmount {
            cap: weights.unusual_amount_cap,
            divisor: weights.unusual_amount_divisor,
            mean_multiple: weights.unusual_amount_mean_multiple,
            max_multiple: weights.unusual_amount_max_multiple,
            high_above: high_threshold,
        }),
        Box::new(RapidTransactions {
            window: Duration::try_minutes(weights.rapid_transactions_window_minutes).unwrap_or(Duration::MAX),
            min_count: weights.rapid_transactions_min_count,
            per_txn: weights.rapid_transactions_per_txn,
            cap: weights.rapid_transactions_cap,
        }),
        Box::new(SuspiciousTiming {
            score: weights.suspicious_timing,
            start_hour: weights.suspicious_hour_start,
            end_hour: weights.suspicious_hour_end,
        }),
        Box::new(AmountPattern {
            round_score: weights.round_amount,
            round_minimum: Amount::from(weights.round_amount_minimum),
            round_step: Amount::from(weights.round_amount_step),
            test_score: weights.test_amount,
            test_amounts: weights.test_amounts.iter().copied().map(Amount::from).collect(),
        }),
        Box::new(BalanceConsistency {
            score: weights.balance_inconsistency,
        }),
        Box::new(MessageTampering {
            score: weights.message_tampering,
        }),
    ]
}

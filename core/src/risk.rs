//! Risk scoring engine.
//!
//! Runs every registered check against one parsed transaction and folds the
//! alerts into a single score:
//!   1. overall = mean of alert scores (0.0 with no alerts)
//!   2. with more than one alert, overall *= multi_alert_boost, capped at 1.0
//!   3. level = highest threshold the overall score reaches, else Safe
//!   4. should_block = overall >= critical threshold

use crate::{
    check::{standard_checks, RiskCheck, RiskContext},
    config::{RiskConfig, RiskThresholds},
    notification::ParsedTransaction,
    record::TransactionRecord,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Alerts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DuplicateReference,
    UnusualAmount,
    RapidTransactions,
    SuspiciousTiming,
    AmountPattern,
    /// Weight is configured but no standard check emits it.
    PhoneMismatch,
    BalanceInconsistency,
    MessageTampering,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::DuplicateReference   => "duplicate_reference",
            AlertKind::UnusualAmount        => "unusual_amount",
            AlertKind::RapidTransactions    => "rapid_transactions",
            AlertKind::SuspiciousTiming     => "suspicious_timing",
            AlertKind::AmountPattern        => "amount_pattern",
            AlertKind::PhoneMismatch        => "phone_mismatch",
            AlertKind::BalanceInconsistency => "balance_inconsistency",
            AlertKind::MessageTampering     => "message_tampering",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low      => "low",
            Severity::Medium   => "medium",
            Severity::High     => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// In [0, 1].
    pub score: f64,
    pub severity: Severity,
    pub description: String,
}

impl Alert {
    pub fn new(kind: AlertKind, score: f64, severity: Severity, description: String) -> Self {
        Self {
            kind,
            score: score.clamp(0.0, 1.0),
            severity,
            description,
        }
    }
}

// ── Assessment ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else if score >= thresholds.low {
            RiskLevel::Low
        } else {
            RiskLevel::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe     => "safe",
            RiskLevel::Low      => "low",
            RiskLevel::Medium   => "medium",
            RiskLevel::High     => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall: f64,
    pub level: RiskLevel,
    pub should_block: bool,
    pub alerts: Vec<Alert>,
}

impl RiskAssessment {
    pub fn recommendation(&self) -> &'static str {
        if self.should_block {
            return "Block transaction and require manual review";
        }
        match self.level {
            RiskLevel::Critical | RiskLevel::High => "Flag for manual review before processing",
            RiskLevel::Medium => "Monitor transaction and log for analysis",
            RiskLevel::Low => "Proceed with caution and log",
            RiskLevel::Safe => "Proceed normally",
        }
    }

    pub fn has_alert(&self, kind: AlertKind) -> bool {
        self.alerts.iter().any(|a| a.kind == kind)
    }
}

/// Presentation-ready summary of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub reference_id: Option<String>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub should_block: bool,
    pub alerts_count: usize,
    pub alerts: Vec<Alert>,
    pub recommendation: String,
}

impl FraudReport {
    pub fn new(txn: &ParsedTransaction, assessment: &RiskAssessment) -> Self {
        Self {
            reference_id: txn.reference_id.clone(),
            risk_score: assessment.overall,
            risk_level: assessment.level,
            should_block: assessment.should_block,
            alerts_count: assessment.alerts.len(),
            alerts: assessment.alerts.clone(),
            recommendation: assessment.recommendation().to_string(),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────

pub struct RiskEngine {
    config: RiskConfig,
    checks: Vec<Box<dyn RiskCheck>>,
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

impl RiskEngine {
    /// Engine with the standard check bank registered.
    pub fn new(config: RiskConfig) -> Self {
        let checks = standard_checks(&config.weights, config.thresholds.high);
        Self { config, checks }
    }

    /// Register an extra check after the standard ones.
    pub fn register(&mut self, check: Box<dyn RiskCheck>) {
        self.checks.push(check);
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn assess(
        &self,
        txn: &ParsedTransaction,
        history: &[TransactionRecord],
        existing: &[TransactionRecord],
    ) -> RiskAssessment {
        let ctx = RiskContext { txn, history, existing };

        let mut alerts = Vec::new();
        for check in &self.checks {
            if let Some(alert) = check.evaluate(&ctx) {
                log::debug!(
                    "risk: {} fired score={:.2} ({})",
                    check.name(),
                    alert.score,
                    alert.description
                );
                alerts.push(alert);
            }
        }

        let overall = self.aggregate(&alerts);
        let thresholds = &self.config.thresholds;
        RiskAssessment {
            overall,
            level: RiskLevel::from_score(overall, thresholds),
            should_block: overall >= thresholds.critical,
            alerts,
        }
    }

    fn aggregate(&self, alerts: &[Alert]) -> f64 {
        if alerts.is_empty() {
            return 0.0;
        }
        let mean = alerts.iter().map(|a| a.score).sum::<f64>() / alerts.len() as f64;
        if alerts.len() > 1 {
            (mean * self.config.weights.multi_alert_boost).min(1.0)
        } else {
            mean
        }
    }
}

/// Assess one transaction with the default configuration.
pub fn assess_risk(
    txn: &ParsedTransaction,
    history: &[TransactionRecord],
    existing: &[TransactionRecord],
) -> RiskAssessment {
    RiskEngine::default().assess(txn, history, existing)
}

//! Engine configuration: risk thresholds and weights, matcher and
//! verification constants, and service-layer settings.
//!
//! Defaults carry the production constants. `EngineConfig::load` overlays a
//! JSON file; any section or key left out keeps its default.

use serde::{Deserialize, Serialize};

// ── Risk scoring ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.6,
            high: 0.8,
            critical: 0.95,
        }
    }
}

/// Alert scores and trigger constants for each check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckWeights {
    pub duplicate_reference: f64,
    /// Ceiling for the unusual-amount score.
    pub unusual_amount_cap: f64,
    /// Ratio-to-mean divisor for the unusual-amount score.
    pub unusual_amount_divisor: f64,
    pub unusual_amount_mean_multiple: f64,
    pub unusual_amount_max_multiple: f64,
    pub rapid_transactions_cap: f64,
    pub rapid_transactions_per_txn: f64,
    pub rapid_transactions_window_minutes: i64,
    pub rapid_transactions_min_count: usize,
    pub suspicious_timing: f64,
    pub suspicious_hour_start: u32,
    pub suspicious_hour_end: u32,
    pub round_amount: f64,
    pub round_amount_minimum: i64,
    pub round_amount_step: i64,
    pub test_amount: f64,
    pub test_amounts: Vec<i64>,
    /// Reserved; no check emits it yet.
    pub phone_mismatch: f64,
    pub balance_inconsistency: f64,
    pub message_tampering: f64,
    /// Multiplier applied when more than one alert fires.
    pub multi_alert_boost: f64,
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            duplicate_reference: 0.9,
            unusual_amount_cap: 0.9,
            unusual_amount_divisor: 15.0,
            unusual_amount_mean_multiple: 10.0,
            unusual_amount_max_multiple: 2.0,
            rapid_transactions_cap: 0.9,
            rapid_transactions_per_txn: 0.15,
            rapid_transactions_window_minutes: 5,
            rapid_transactions_min_count: 5,
            suspicious_timing: 0.6,
            suspicious_hour_start: 2,
            suspicious_hour_end: 5,
            round_amount: 0.7,
            round_amount_minimum: 50_000,
            round_amount_step: 1_000,
            test_amount: 0.4,
            test_amounts: vec![1, 10, 100, 1_000],
            phone_mismatch: 0.8,
            balance_inconsistency: 0.9,
            message_tampering: 0.8,
            multi_alert_boost: 1.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub thresholds: RiskThresholds,
    pub weights: CheckWeights,
}

// ── Reference matching ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub fuzzy_min_similarity: f64,
    pub fuzzy_high_similarity: f64,
    pub time_window_minutes: i64,
    pub time_weight: f64,
    pub similarity_weight: f64,
    pub time_min_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_similarity: 0.8,
            fuzzy_high_similarity: 0.9,
            time_window_minutes: 60,
            time_weight: 0.6,
            similarity_weight: 0.4,
            time_min_confidence: 0.6,
        }
    }
}

// ── Detail verification ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub amount_tolerance: f64,
    pub amount_mismatch_factor: f64,
    pub max_age_hours: i64,
    pub stale_factor: f64,
    pub incoming_factor: f64,
    pub verified_min_confidence: f64,
    pub proceed_min_confidence: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.01,
            amount_mismatch_factor: 0.5,
            max_age_hours: 24,
            stale_factor: 0.8,
            incoming_factor: 0.9,
            verified_min_confidence: 0.7,
            proceed_min_confidence: 0.95,
        }
    }
}

// ── Service layer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Shared code a merchant must present before verifying a payment.
    pub verification_code: String,
    /// Look-back used as risk history when a notification is processed.
    pub recent_window_hours: i64,
    /// Look-back searched when a payment is verified.
    pub verify_window_hours: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            verification_code: "1043577".into(),
            recent_window_hours: 24,
            verify_window_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub matcher: MatcherConfig,
    pub verification: VerificationConfig,
    pub service: ServiceConfig,
}

impl EngineConfig {
    /// Load from a JSON file. In tests, use EngineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.service.verification_code = "test-code".into();
        config
    }

    fn validate(&self) -> anyhow::Result<()> {
        let t = &self.risk.thresholds;
        if !(t.low <= t.medium && t.medium <= t.high && t.high <= t.critical) {
            anyhow::bail!("risk thresholds must be ascending: {t:?}");
        }
        if self.risk.weights.multi_alert_boost < 1.0 {
            anyhow::bail!("multi_alert_boost must be >= 1.0");
        }
        if self.matcher.time_window_minutes <= 0 {
            anyhow::bail!("matcher.time_window_minutes must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let json = r#"{ "service": { "verification_code": "777" }, "risk": { "thresholds": { "low": 0.25 } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.service.verification_code, "777");
        assert_eq!(config.service.verify_window_hours, 48);
        assert_eq!(config.risk.thresholds.low, 0.25);
        assert_eq!(config.risk.thresholds.critical, 0.95);
        assert_eq!(config.matcher, MatcherConfig::default());
    }

    #[test]
    fn descending_thresholds_are_rejected() {
        let mut config = EngineConfig::default();
        config.risk.thresholds.high = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/config/engine.json");
        let config = EngineConfig::load(path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/nonexistent/engine.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}

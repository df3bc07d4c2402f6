//! The desk engine: wires the pure components to the store.
//!
//! PROCESSING ORDER for one notification (fixed):
//!   1. Parse            classifier::parse
//!   2. Persist          transactions row
//!   3. Load window      recent_window_hours before received_at
//!   4. Assess risk      window used as history and as existing set
//!   5. Persist alerts   one fraud_alerts row per alert
//!
//! RULES:
//!   - Every state change is recorded in the event log.
//!   - The engine never reads the clock itself; callers pass the time in.
//!     `recent` and `stats` are the only exception.

use crate::{
    classifier,
    config::EngineConfig,
    error::{DeskError, DeskResult},
    event::{DeskEvent, EventLogEntry},
    matcher::ReferenceMatcher,
    notification::{ParsedTransaction, RawNotification},
    record::TransactionRecord,
    risk::{FraudReport, RiskEngine},
    store::{DeskStats, DeskStore, FraudAlertRow, VerificationRow},
    types::{hours_before, Amount, Timestamp},
    verification::{VerificationReport, Verifier},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// A merchant's request to confirm a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub reference: String,
    pub verification_code: String,
    pub expected_amount: Option<Amount>,
    pub requested_at: Timestamp,
}

/// Outcome of processing one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub success: bool,
    pub record_id: Option<String>,
    pub parsed: ParsedTransaction,
    pub fraud: Option<FraudReport>,
    pub error: Option<String>,
    pub processing_time_ms: f64,
}

pub struct DeskEngine {
    config: EngineConfig,
    store: DeskStore,
    risk: RiskEngine,
    matcher: ReferenceMatcher,
    verifier: Verifier,
}

impl DeskEngine {
    pub fn new(store: DeskStore, config: EngineConfig) -> Self {
        Self {
            risk: RiskEngine::new(config.risk.clone()),
            matcher: ReferenceMatcher::new(&config.matcher),
            verifier: Verifier::new(config.verification.clone()),
            config,
            store,
        }
    }

    /// Migrate the store and build a fully wired engine.
    pub fn build(store: DeskStore, config: EngineConfig) -> DeskResult<Self> {
        store.migrate()?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &DeskStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn log_event(&self, event: &DeskEvent, at: Timestamp) -> DeskResult<()> {
        let entry = EventLogEntry::new(event, at)?;
        self.store.append_event(&entry)
    }

    // ── Notifications ──────────────────────────────────────────

    pub fn process_notification(&self, raw: &RawNotification) -> DeskResult<ProcessingReport> {
        let started = Instant::now();
        let preview: String = raw.text.chars().take(100).collect();
        log::info!("engine: processing notification from {}: {preview}", raw.sender);

        let parsed = classifier::parse(&raw.text);
        let record_id = Uuid::new_v4().to_string();

        let Some(record) = TransactionRecord::from_parsed(record_id.clone(), &parsed) else {
            let error = parsed
                .error
                .clone()
                .unwrap_or_else(|| "Unknown parsing error".to_string());
            self.log_event(
                &DeskEvent::NotificationRejected {
                    attempted_category: parsed.attempted_category,
                    reference_id: parsed.reference_id.clone(),
                    sender: raw.sender.clone(),
                    received_at: raw.received_at,
                    error: error.clone(),
                },
                raw.received_at,
            )?;
            return Ok(ProcessingReport {
                success: false,
                record_id: None,
                parsed,
                fraud: None,
                error: Some(error),
                processing_time_ms: elapsed_ms(started),
            });
        };

        self.store.insert_transaction(&record, raw.received_at)?;
        self.log_event(
            &DeskEvent::NotificationParsed {
                record_id: record_id.clone(),
                category: record.category,
                reference_id: record.reference_id.clone(),
                sender: raw.sender.clone(),
                received_at: raw.received_at,
            },
            raw.received_at,
        )?;

        let since = hours_before(raw.received_at, self.config.service.recent_window_hours);
        let window = self.store.recent_transactions(since, None)?;
        let assessment = self.risk.assess(&parsed, &window, &window);

        for alert in &assessment.alerts {
            let alert_id = Uuid::new_v4().to_string();
            self.store.insert_fraud_alert(&FraudAlertRow {
                id: alert_id.clone(),
                transaction_id: record_id.clone(),
                kind: alert.kind.as_str().to_string(),
                score: alert.score,
                severity: alert.severity.as_str().to_string(),
                description: alert.description.clone(),
                created_at: raw.received_at,
            })?;
            self.log_event(
                &DeskEvent::FraudAlertRaised {
                    record_id: record_id.clone(),
                    alert_id,
                    kind: alert.kind,
                    score: alert.score,
                },
                raw.received_at,
            )?;
        }

        self.log_event(
            &DeskEvent::RiskAssessed {
                record_id: record_id.clone(),
                overall: assessment.overall,
                level: assessment.level,
                should_block: assessment.should_block,
                alerts: assessment.alerts.len(),
            },
            raw.received_at,
        )?;

        if assessment.should_block {
            log::warn!(
                "engine: record={record_id} blocked, risk={:.2} alerts={}",
                assessment.overall,
                assessment.alerts.len()
            );
        }

        let fraud = FraudReport::new(&parsed, &assessment);
        Ok(ProcessingReport {
            success: true,
            record_id: Some(record_id),
            parsed,
            fraud: Some(fraud),
            error: None,
            processing_time_ms: elapsed_ms(started),
        })
    }

    // ── Verification ───────────────────────────────────────────

    pub fn verify_payment(&self, request: &VerificationRequest) -> DeskResult<VerificationReport> {
        let reference = request.reference.trim();
        if reference.is_empty() {
            return Err(DeskError::MissingReference);
        }
        if request.verification_code != self.config.service.verification_code {
            log::warn!("engine: invalid verification code for reference '{reference}'");
            return Err(DeskError::InvalidVerificationCode);
        }

        let since = hours_before(request.requested_at, self.config.service.verify_window_hours);
        let window = self.store.recent_transactions(since, None)?;
        if window.is_empty() {
            log::warn!("engine: no transactions received since {since}");
        }

        let found = self.matcher.find(reference, &window, Some(request.requested_at));
        let outcome = self
            .verifier
            .verify_at(&found, request.expected_amount, request.requested_at);
        let report = self.verifier.report(reference, &found, &outcome);

        let verification_id = Uuid::new_v4().to_string();
        let matched_record = found.record.map(|r| r.id.clone());
        self.store.insert_verification(&VerificationRow {
            id: verification_id.clone(),
            reference: reference.to_string(),
            transaction_id: matched_record.clone(),
            expected_amount: request.expected_amount,
            match_type: found.match_type.as_str().to_string(),
            match_confidence: found.confidence,
            verified: outcome.verified,
            confidence: outcome.confidence,
            issues: outcome.issues.clone(),
            attempted_at: request.requested_at,
        })?;
        self.log_event(
            &DeskEvent::VerificationAttempted {
                verification_id,
                reference: reference.to_string(),
                match_type: found.match_type,
                matched_record,
                verified: outcome.verified,
                confidence: outcome.confidence,
            },
            request.requested_at,
        )?;

        log::info!(
            "engine: verification of '{reference}' match={} verified={}",
            found.match_type.as_str(),
            outcome.verified
        );
        Ok(report)
    }

    // ── Queries ────────────────────────────────────────────────

    /// Transactions received in the `hours` before `now`, newest first.
    pub fn recent_at(&self, now: Timestamp, hours: i64, limit: Option<usize>) -> DeskResult<Vec<TransactionRecord>> {
        self.store.recent_transactions(hours_before(now, hours), limit)
    }

    pub fn recent(&self, hours: i64, limit: Option<usize>) -> DeskResult<Vec<TransactionRecord>> {
        self.recent_at(local_now(), hours, limit)
    }

    pub fn search(&self, reference: &str) -> DeskResult<Vec<TransactionRecord>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DeskError::MissingReference);
        }
        self.store.transactions_by_reference(reference)
    }

    pub fn stats_at(&self, now: Timestamp) -> DeskResult<DeskStats> {
        self.store.stats(hours_before(now, 24))
    }

    pub fn stats(&self) -> DeskResult<DeskStats> {
        self.stats_at(local_now())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn local_now() -> Timestamp {
    chrono::Local::now().naive_local()
}

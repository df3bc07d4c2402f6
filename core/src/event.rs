//! Desk events: what the service layer records about each request.
//!
//! RULE: Every state change the engine makes is mirrored by an event.
//! Events are appended to the event log as JSON and never rewritten.

use crate::{
    matcher::MatchType,
    notification::Category,
    risk::{AlertKind, RiskLevel},
    types::{RecordId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskEvent {
    // ── Notification intake ────────────────────────
    NotificationParsed {
        record_id: RecordId,
        category: Category,
        reference_id: Option<String>,
        sender: String,
        received_at: Timestamp,
    },
    NotificationRejected {
        attempted_category: Option<Category>,
        reference_id: Option<String>,
        sender: String,
        received_at: Timestamp,
        error: String,
    },

    // ── Risk ───────────────────────────────────────
    RiskAssessed {
        record_id: RecordId,
        overall: f64,
        level: RiskLevel,
        should_block: bool,
        alerts: usize,
    },
    FraudAlertRaised {
        record_id: RecordId,
        alert_id: RecordId,
        kind: AlertKind,
        score: f64,
    },

    // ── Verification ───────────────────────────────
    VerificationAttempted {
        verification_id: RecordId,
        reference: String,
        match_type: MatchType,
        matched_record: Option<RecordId>,
        verified: bool,
        confidence: f64,
    },
}

impl DeskEvent {
    /// Stable name stored in the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            DeskEvent::NotificationParsed { .. }    => "notification_parsed",
            DeskEvent::NotificationRejected { .. }  => "notification_rejected",
            DeskEvent::RiskAssessed { .. }          => "risk_assessed",
            DeskEvent::FraudAlertRaised { .. }      => "fraud_alert_raised",
            DeskEvent::VerificationAttempted { .. } => "verification_attempted",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub recorded_at: Timestamp,
    pub event_type: String,
    pub payload: String, // JSON-serialized DeskEvent
}

impl EventLogEntry {
    pub fn new(event: &DeskEvent, recorded_at: Timestamp) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            recorded_at,
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<DeskEvent> {
        serde_json::from_str(&self.payload)
    }
}

//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods; the pure components never see it.
//! Decimals are stored as TEXT and timestamps as TIMESTAMP_FORMAT strings,
//! so window queries compare lexicographically.

use crate::{
    error::{DeskError, DeskResult},
    event::EventLogEntry,
    notification::Category,
    record::TransactionRecord,
    types::{Amount, RecordId, Timestamp, TIMESTAMP_FORMAT},
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ── Rows ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FraudAlertRow {
    pub id: RecordId,
    pub transaction_id: RecordId,
    pub kind: String,
    pub score: f64,
    pub severity: String,
    pub description: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRow {
    pub id: RecordId,
    pub reference: String,
    pub transaction_id: Option<RecordId>,
    pub expected_amount: Option<Amount>,
    pub match_type: String,
    pub match_confidence: f64,
    pub verified: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub attempted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskStats {
    pub total_transactions: u64,
    pub total_verifications: u64,
    pub successful_verifications: u64,
    /// Percentage of verifications that passed, 0.0 when there were none.
    pub verification_success_rate: f64,
    pub by_category: Vec<CategoryCount>,
    pub recent_transactions_24h: u64,
}

/// Raw column values of one `transactions` row, before decoding.
struct TransactionRow {
    id: String,
    category: String,
    reference_id: Option<String>,
    external_reference_id: Option<String>,
    amount: String,
    fee: String,
    counterparty_name: Option<String>,
    counterparty_phone: Option<String>,
    counterparty_code: Option<String>,
    new_balance: Option<String>,
    occurred_at: String,
    sender_message: Option<String>,
    agent_name: Option<String>,
    agent_phone: Option<String>,
    token: Option<String>,
    electricity_units: Option<String>,
    raw_text: String,
}

const TRANSACTION_COLUMNS: &str = "id, category, reference_id, external_reference_id, amount, fee,
     counterparty_name, counterparty_phone, counterparty_code, new_balance,
     occurred_at, sender_message, agent_name, agent_phone, token,
     electricity_units, raw_text";

impl TransactionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id:                    row.get(0)?,
            category:              row.get(1)?,
            reference_id:          row.get(2)?,
            external_reference_id: row.get(3)?,
            amount:                row.get(4)?,
            fee:                   row.get(5)?,
            counterparty_name:     row.get(6)?,
            counterparty_phone:    row.get(7)?,
            counterparty_code:     row.get(8)?,
            new_balance:           row.get(9)?,
            occurred_at:           row.get(10)?,
            sender_message:        row.get(11)?,
            agent_name:            row.get(12)?,
            agent_phone:           row.get(13)?,
            token:                 row.get(14)?,
            electricity_units:     row.get(15)?,
            raw_text:              row.get(16)?,
        })
    }

    fn decode(self) -> DeskResult<TransactionRecord> {
        let id = self.id;
        let category = Category::from_name(&self.category).ok_or_else(|| DeskError::CorruptRow {
            row_id: id.clone(),
            column: "category",
            reason: format!("unknown category '{}'", self.category),
        })?;
        let amount = decode_amount(&id, "amount", &self.amount)?;
        let fee = decode_amount(&id, "fee", &self.fee)?;
        let new_balance = self
            .new_balance
            .map(|v| decode_amount(&id, "new_balance", &v))
            .transpose()?;
        let electricity_units = self
            .electricity_units
            .map(|v| decode_amount(&id, "electricity_units", &v))
            .transpose()?;
        let occurred_at = decode_timestamp(&id, "occurred_at", &self.occurred_at)?;

        Ok(TransactionRecord {
            id,
            category,
            reference_id: self.reference_id,
            external_reference_id: self.external_reference_id,
            amount,
            fee,
            counterparty_name: self.counterparty_name,
            counterparty_phone: self.counterparty_phone,
            counterparty_code: self.counterparty_code,
            new_balance,
            occurred_at,
            sender_message: self.sender_message,
            agent_name: self.agent_name,
            agent_phone: self.agent_phone,
            token: self.token,
            electricity_units,
            raw_text: self.raw_text,
        })
    }
}

fn decode_amount(row_id: &str, column: &'static str, value: &str) -> DeskResult<Amount> {
    Amount::from_str(value).map_err(|e| DeskError::CorruptRow {
        row_id: row_id.to_string(),
        column,
        reason: e.to_string(),
    })
}

fn decode_timestamp(row_id: &str, column: &'static str, value: &str) -> DeskResult<Timestamp> {
    Timestamp::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| DeskError::CorruptRow {
        row_id: row_id.to_string(),
        column,
        reason: e.to_string(),
    })
}

fn fmt_ts(ts: Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ── Store ─────────────────────────────────────────────────────────────────

pub struct DeskStore {
    conn: Connection,
}

impl DeskStore {
    /// Open (or create) the desk database at `path`.
    pub fn open(path: &str) -> DeskResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DeskResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DeskResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Transactions ───────────────────────────────────────────

    pub fn insert_transaction(&self, record: &TransactionRecord, received_at: Timestamp) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO transactions
             (id, category, reference_id, external_reference_id, amount, fee,
              counterparty_name, counterparty_phone, counterparty_code, new_balance,
              occurred_at, sender_message, agent_name, agent_phone, token,
              electricity_units, raw_text, received_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            params![
                record.id,
                record.category.as_str(),
                record.reference_id,
                record.external_reference_id,
                record.amount.to_string(),
                record.fee.to_string(),
                record.counterparty_name,
                record.counterparty_phone,
                record.counterparty_code,
                record.new_balance.map(|b| b.to_string()),
                fmt_ts(record.occurred_at),
                record.sender_message,
                record.agent_name,
                record.agent_phone,
                record.token,
                record.electricity_units.map(|u| u.to_string()),
                record.raw_text,
                fmt_ts(received_at),
            ],
        )?;
        Ok(())
    }

    fn query_transactions(
        &self,
        sql_tail: &str,
        args: impl rusqlite::Params,
    ) -> DeskResult<Vec<TransactionRecord>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions {sql_tail}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, TransactionRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TransactionRow::decode).collect()
    }

    pub fn get_transaction(&self, id: &str) -> DeskResult<Option<TransactionRecord>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], TransactionRow::read)
            .optional()?;
        row.map(TransactionRow::decode).transpose()
    }

    /// Transactions received at or after `since`, newest first.
    pub fn recent_transactions(&self, since: Timestamp, limit: Option<usize>) -> DeskResult<Vec<TransactionRecord>> {
        let limit = limit.map_or(-1, |l| l as i64);
        self.query_transactions(
            "WHERE received_at >= ?1 ORDER BY received_at DESC, rowid DESC LIMIT ?2",
            params![fmt_ts(since), limit],
        )
    }

    /// Transactions whose own or external reference equals `reference`.
    pub fn transactions_by_reference(&self, reference: &str) -> DeskResult<Vec<TransactionRecord>> {
        self.query_transactions(
            "WHERE reference_id = ?1 OR external_reference_id = ?1 ORDER BY received_at DESC",
            params![reference],
        )
    }

    // ── Fraud alerts ───────────────────────────────────────────

    pub fn insert_fraud_alert(&self, alert: &FraudAlertRow) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO fraud_alerts
             (id, transaction_id, kind, score, severity, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                alert.id,
                alert.transaction_id,
                alert.kind,
                alert.score,
                alert.severity,
                alert.description,
                fmt_ts(alert.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn alerts_for_transaction(&self, transaction_id: &str) -> DeskResult<Vec<FraudAlertRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, transaction_id, kind, score, severity, description, created_at
             FROM fraud_alerts WHERE transaction_id = ?1
             ORDER BY rowid ASC",
        )?;
        let raw = stmt
            .query_map(params![transaction_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, transaction_id, kind, score, severity, description, created_at)| -> DeskResult<FraudAlertRow> {
                let created_at = decode_timestamp(&id, "created_at", &created_at)?;
                Ok(FraudAlertRow { id, transaction_id, kind, score, severity, description, created_at })
            })
            .collect()
    }

    // ── Verifications ──────────────────────────────────────────

    pub fn insert_verification(&self, v: &VerificationRow) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO payment_verifications
             (id, reference, transaction_id, expected_amount, match_type,
              match_confidence, verified, confidence, issues, attempted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                v.id,
                v.reference,
                v.transaction_id,
                v.expected_amount.map(|a| a.to_string()),
                v.match_type,
                v.match_confidence,
                v.verified,
                v.confidence,
                serde_json::to_string(&v.issues)?,
                fmt_ts(v.attempted_at),
            ],
        )?;
        Ok(())
    }

    pub fn verifications_for_reference(&self, reference: &str) -> DeskResult<Vec<VerificationRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, reference, transaction_id, expected_amount, match_type,
                    match_confidence, verified, confidence, issues, attempted_at
             FROM payment_verifications WHERE reference = ?1
             ORDER BY rowid ASC",
        )?;
        let raw = stmt
            .query_map(params![reference], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, f64>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, reference, transaction_id, expected, match_type, match_confidence, verified, confidence, issues, attempted_at)| -> DeskResult<VerificationRow> {
                let expected_amount = expected
                    .map(|v| decode_amount(&id, "expected_amount", &v))
                    .transpose()?;
                let attempted_at = decode_timestamp(&id, "attempted_at", &attempted_at)?;
                Ok(VerificationRow {
                    issues: serde_json::from_str(&issues)?,
                    id,
                    reference,
                    transaction_id,
                    expected_amount,
                    match_type,
                    match_confidence,
                    verified,
                    confidence,
                    attempted_at,
                })
            })
            .collect()
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (recorded_at, event_type, payload) VALUES (?1, ?2, ?3)",
            params![fmt_ts(entry.recorded_at), entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    /// All events, oldest first; optionally only one `event_type`.
    pub fn events(&self, event_type: Option<&str>) -> DeskResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, event_type, payload
             FROM event_log WHERE ?1 IS NULL OR event_type = ?1
             ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![event_type], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, recorded_at, event_type, payload)| -> DeskResult<EventLogEntry> {
                Ok(EventLogEntry {
                    id: Some(id),
                    recorded_at: decode_timestamp(&id.to_string(), "recorded_at", &recorded_at)?,
                    event_type,
                    payload,
                })
            })
            .collect()
    }

    // ── Stats ──────────────────────────────────────────────────

    pub fn stats(&self, recent_since: Timestamp) -> DeskResult<DeskStats> {
        let count = |sql: &str| -> DeskResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };
        let total_transactions = count("SELECT COUNT(*) FROM transactions")?;
        let total_verifications = count("SELECT COUNT(*) FROM payment_verifications")?;
        let successful_verifications =
            count("SELECT COUNT(*) FROM payment_verifications WHERE verified = 1")?;

        let recent: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE received_at >= ?1",
            params![fmt_ts(recent_since)],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM transactions GROUP BY category ORDER BY category",
        )?;
        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let by_category = raw
            .into_iter()
            .map(|(name, n)| -> DeskResult<CategoryCount> {
                let category = Category::from_name(&name).ok_or_else(|| DeskError::CorruptRow {
                    row_id: name.clone(),
                    column: "category",
                    reason: "unknown category".into(),
                })?;
                Ok(CategoryCount { category, count: n as u64 })
            })
            .collect::<DeskResult<Vec<_>>>()?;

        let verification_success_rate = if total_verifications == 0 {
            0.0
        } else {
            successful_verifications as f64 / total_verifications as f64 * 100.0
        };

        Ok(DeskStats {
            total_transactions,
            total_verifications,
            successful_verifications,
            verification_success_rate,
            by_category,
            recent_transactions_24h: recent as u64,
        })
    }
}

//! The flat, id-bearing transaction shape shared with the outside world.
//!
//! History, duplicate sets and match candidates are all supplied as
//! `TransactionRecord`s. The store persists exactly this shape.

use crate::{
    normalize::{all_references, normalize_reference},
    notification::{Category, CategoryDetails, ParsedTransaction},
    types::{Amount, RecordId, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub category: Category,
    pub reference_id: Option<String>,
    pub external_reference_id: Option<String>,
    pub amount: Amount,
    pub fee: Amount,
    pub counterparty_name: Option<String>,
    pub counterparty_phone: Option<String>,
    pub counterparty_code: Option<String>,
    pub new_balance: Option<Amount>,
    pub occurred_at: Timestamp,
    pub sender_message: Option<String>,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    pub token: Option<String>,
    pub electricity_units: Option<Amount>,
    pub raw_text: String,
}

impl TransactionRecord {
    /// Flatten a successfully parsed notification. Returns `None` for
    /// unparsed ones: they have no amount or timestamp to store.
    pub fn from_parsed(id: RecordId, txn: &ParsedTransaction) -> Option<Self> {
        let fields = txn.fields.as_ref()?;
        let details = &fields.details;

        let mut record = Self {
            id,
            category: details.category(),
            reference_id: details.reference_id().map(str::to_string),
            external_reference_id: details.external_reference_id().map(str::to_string),
            amount: fields.amount,
            fee: fields.fee,
            counterparty_name: Some(details.counterparty_name().to_string()),
            counterparty_phone: details.counterparty_phone().map(str::to_string),
            counterparty_code: None,
            new_balance: Some(fields.new_balance),
            occurred_at: fields.occurred_at,
            sender_message: None,
            agent_name: None,
            agent_phone: None,
            token: None,
            electricity_units: None,
            raw_text: txn.raw_text.clone(),
        };

        match details {
            CategoryDetails::PaymentOut { counterparty_code, .. } => {
                record.counterparty_code = counterparty_code.clone();
            }
            CategoryDetails::PaymentIn { sender_message, .. } => {
                record.sender_message = sender_message.clone();
            }
            CategoryDetails::Withdrawal { agent_name, agent_phone, agent_message, .. } => {
                record.agent_name = Some(agent_name.clone());
                record.agent_phone = Some(agent_phone.clone());
                record.sender_message = agent_message.clone();
            }
            CategoryDetails::Airtime { token, .. } => {
                record.token = token.clone();
            }
            CategoryDetails::Electricity { token, electricity_units, .. } => {
                record.token = Some(token.clone());
                record.electricity_units = Some(*electricity_units);
            }
            CategoryDetails::TransferOut { .. } => {}
        }
        Some(record)
    }

    /// Every normalized reference this record can be found by: its own
    /// reference, its external reference, and every cue in the raw text.
    pub fn candidate_references(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        let declared = [&self.reference_id, &self.external_reference_id];
        for reference in declared.into_iter().flatten() {
            let normalized = normalize_reference(reference);
            if !normalized.is_empty() && !refs.contains(&normalized) {
                refs.push(normalized);
            }
        }
        for normalized in all_references(&self.raw_text) {
            if !refs.contains(&normalized) {
                refs.push(normalized);
            }
        }
        refs
    }
}

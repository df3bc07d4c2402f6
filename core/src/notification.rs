//! Notification data model: raw input, categories, and the parsed record.
//!
//! A successfully parsed notification carries `TransactionFields`, whose
//! `details` is a tagged union holding only what that category guarantees.
//! A failed parse carries an error string and a best-effort reference.

use crate::types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A notification exactly as it arrived. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNotification {
    pub text: String,
    pub sender: String,
    pub received_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PaymentOut,
    TransferOut,
    PaymentIn,
    Withdrawal,
    Airtime,
    Electricity,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::PaymentOut,
        Category::TransferOut,
        Category::PaymentIn,
        Category::Withdrawal,
        Category::Airtime,
        Category::Electricity,
        Category::Unknown,
    ];

    /// Stable snake_case name, used in logs, error strings and the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PaymentOut  => "payment_out",
            Category::TransferOut => "transfer_out",
            Category::PaymentIn   => "payment_in",
            Category::Withdrawal  => "withdrawal",
            Category::Airtime     => "airtime",
            Category::Electricity => "electricity",
            Category::Unknown     => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Money left the account holder (balance must stay non-negative).
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Category::PaymentOut | Category::TransferOut)
    }

    /// Money arrived; such records are weak evidence of a customer payment.
    pub fn is_incoming(&self) -> bool {
        matches!(self, Category::PaymentIn)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-specific fields. Each variant carries only what its templates
/// always capture; genuinely optional data stays `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CategoryDetails {
    PaymentOut {
        reference_id: String,
        counterparty_name: String,
        counterparty_code: Option<String>,
    },
    TransferOut {
        /// Transfers print no id of their own; taken from any cue in the text.
        reference_id: Option<String>,
        counterparty_name: String,
        counterparty_phone: String,
        sender_account: String,
    },
    PaymentIn {
        reference_id: String,
        counterparty_name: String,
        counterparty_phone: Option<String>,
        sender_message: Option<String>,
    },
    Withdrawal {
        reference_id: String,
        account_holder: String,
        account_phone: String,
        agent_name: String,
        agent_phone: String,
        agent_message: Option<String>,
    },
    Airtime {
        reference_id: String,
        product: String,
        token: Option<String>,
        external_reference_id: String,
        message: Option<String>,
    },
    Electricity {
        reference_id: String,
        provider: String,
        token: String,
        external_reference_id: String,
        electricity_units: Amount,
    },
}

impl CategoryDetails {
    pub fn category(&self) -> Category {
        match self {
            CategoryDetails::PaymentOut { .. }  => Category::PaymentOut,
            CategoryDetails::TransferOut { .. } => Category::TransferOut,
            CategoryDetails::PaymentIn { .. }   => Category::PaymentIn,
            CategoryDetails::Withdrawal { .. }  => Category::Withdrawal,
            CategoryDetails::Airtime { .. }     => Category::Airtime,
            CategoryDetails::Electricity { .. } => Category::Electricity,
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            CategoryDetails::TransferOut { reference_id, .. } => reference_id.as_deref(),
            CategoryDetails::PaymentOut { reference_id, .. }
            | CategoryDetails::PaymentIn { reference_id, .. }
            | CategoryDetails::Withdrawal { reference_id, .. }
            | CategoryDetails::Airtime { reference_id, .. }
            | CategoryDetails::Electricity { reference_id, .. } => Some(reference_id),
        }
    }

    pub fn external_reference_id(&self) -> Option<&str> {
        match self {
            CategoryDetails::Airtime { external_reference_id, .. }
            | CategoryDetails::Electricity { external_reference_id, .. } => {
                Some(external_reference_id)
            }
            _ => None,
        }
    }

    /// The named party on the notification other than the agent: payee,
    /// payer, the withdrawing account holder, or the utility/product sold.
    /// A withdrawal's agent lives in the record's own agent fields.
    pub fn counterparty_name(&self) -> &str {
        match self {
            CategoryDetails::PaymentOut { counterparty_name, .. }
            | CategoryDetails::TransferOut { counterparty_name, .. }
            | CategoryDetails::PaymentIn { counterparty_name, .. } => counterparty_name,
            CategoryDetails::Withdrawal { account_holder, .. } => account_holder,
            CategoryDetails::Airtime { product, .. } => product,
            CategoryDetails::Electricity { provider, .. } => provider,
        }
    }

    pub fn counterparty_phone(&self) -> Option<&str> {
        match self {
            CategoryDetails::TransferOut { counterparty_phone, .. } => Some(counterparty_phone),
            CategoryDetails::PaymentIn { counterparty_phone, .. } => counterparty_phone.as_deref(),
            CategoryDetails::Withdrawal { account_phone, .. } => Some(account_phone),
            _ => None,
        }
    }
}

/// Fields every successfully parsed notification has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFields {
    pub amount: Amount,
    pub fee: Amount,
    pub new_balance: Amount,
    pub occurred_at: Timestamp,
    pub details: CategoryDetails,
}

/// One record per raw notification. Built only through `extracted` or
/// `unparsed`, which keep `parsed`, `category` and `fields` consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    /// Whitespace-normalized input text.
    pub raw_text: String,
    pub parsed: bool,
    pub category: Category,
    pub reference_id: Option<String>,
    pub fields: Option<TransactionFields>,
    pub error: Option<String>,
    /// Category whose templates were tried when extraction failed.
    pub attempted_category: Option<Category>,
    /// Soft problems that did not stop extraction (e.g. clock fallback).
    pub warnings: Vec<String>,
}

impl ParsedTransaction {
    pub fn extracted(raw_text: String, fields: TransactionFields, warnings: Vec<String>) -> Self {
        Self {
            raw_text,
            parsed: true,
            category: fields.details.category(),
            reference_id: fields.details.reference_id().map(str::to_string),
            fields: Some(fields),
            error: None,
            attempted_category: None,
            warnings,
        }
    }

    pub fn unparsed(
        raw_text: String,
        attempted_category: Category,
        reference_id: Option<String>,
        error: String,
    ) -> Self {
        Self {
            raw_text,
            parsed: false,
            category: Category::Unknown,
            reference_id,
            fields: None,
            error: Some(error),
            attempted_category: Some(attempted_category),
            warnings: Vec::new(),
        }
    }

    pub fn amount(&self) -> Option<Amount> {
        self.fields.as_ref().map(|f| f.amount)
    }

    pub fn occurred_at(&self) -> Option<Timestamp> {
        self.fields.as_ref().map(|f| f.occurred_at)
    }

    pub fn new_balance(&self) -> Option<Amount> {
        self.fields.as_ref().map(|f| f.new_balance)
    }

    pub fn details(&self) -> Option<&CategoryDetails> {
        self.fields.as_ref().map(|f| &f.details)
    }
}

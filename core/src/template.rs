//! Extraction templates.
//!
//! A template is a pattern plus a positional map from capture group to the
//! semantic role of what it captures. Templates are grouped by category and
//! tried in declaration order; the first one that matches wins.

use crate::{
    error::{ExtractionError, NormalizeError},
    normalize::normalize_amount,
    notification::Category,
    types::Amount,
};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// What a capture group holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    ReferenceId,
    Amount,
    Fee,
    NewBalance,
    Timestamp,
    CounterpartyName,
    CounterpartyCode,
    CounterpartyPhone,
    SenderAccount,
    AccountHolder,
    AccountPhone,
    AgentName,
    AgentPhone,
    Message,
    Token,
    ExternalReferenceId,
    ExternalReferenceSuffix,
    ElectricityUnits,
}

/// Group `i + 1` of `pattern` holds `fields[i]`.
#[derive(Debug)]
pub struct ExtractionTemplate {
    pub name: &'static str,
    pub category: Category,
    pub pattern: &'static str,
    pub fields: &'static [FieldRole],
}

use FieldRole as F;

pub static TEMPLATES: &[ExtractionTemplate] = &[
    // ── Merchant payments ─────────────────────────────────────────
    ExtractionTemplate {
        name: "payment_out_with_code",
        category: Category::PaymentOut,
        pattern: r"TxId:\s*(\d+)\.\s*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to ([^\d]+?)\s*(\d+)\s*has been completed at ([\d\s:-]+)\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\.\s*Fee was\s*([\d,]+)\s*RWF",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::CounterpartyCode, F::Timestamp, F::NewBalance, F::Fee],
    },
    ExtractionTemplate {
        name: "payment_out_without_code",
        category: Category::PaymentOut,
        pattern: r"TxId:\s*(\d+)\.\s*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to (.+?)\s+has been completed at ([\d\s:-]+)\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\.\s*Fee was\s*([\d,]+)\s*RWF",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::Timestamp, F::NewBalance, F::Fee],
    },
    // ── Person-to-person transfers ────────────────────────────────
    ExtractionTemplate {
        name: "transfer_out_ussd",
        category: Category::TransferOut,
        pattern: r"\*165\*S\*([\d,]+(?:\.\d+)?)\s*RWF transferred to ([^(]+?)\s*\((\d+)\) from (\d+) at ([\d\s:-]+?)\s*\.\s*Fee was:\s*([\d,]+)\s*RWF\.\s*New balance:\s*([\d,]+(?:\.\d+)?)\s*RWF",
        fields: &[F::Amount, F::CounterpartyName, F::CounterpartyPhone, F::SenderAccount, F::Timestamp, F::Fee, F::NewBalance],
    },
    ExtractionTemplate {
        name: "transfer_out_plain",
        category: Category::TransferOut,
        pattern: r"([\d,]+(?:\.\d+)?)\s*RWF transferred to ([^(]+?)\s*\((\d+)\) from (\d+) at ([\d\s:-]+?)\s*\.\s*Fee was:\s*([\d,]+)\s*RWF\.\s*New balance:\s*([\d,]+(?:\.\d+)?)\s*RWF",
        fields: &[F::Amount, F::CounterpartyName, F::CounterpartyPhone, F::SenderAccount, F::Timestamp, F::Fee, F::NewBalance],
    },
    // ── Incoming money ────────────────────────────────────────────
    ExtractionTemplate {
        name: "payment_in_with_message",
        category: Category::PaymentIn,
        pattern: r"You have received ([\d,]+(?:\.\d+)?)\s*RWF from ([^(]+?)\s*\(([^)]+)\) on your mobile money account at ([\d\s:-]+)\.\s*Message from sender:\s*([^.]*)\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\.\s*Financial Transaction Id:\s*(\d+)",
        fields: &[F::Amount, F::CounterpartyName, F::CounterpartyPhone, F::Timestamp, F::Message, F::NewBalance, F::ReferenceId],
    },
    ExtractionTemplate {
        name: "payment_in_plain",
        category: Category::PaymentIn,
        pattern: r"You have received ([\d,]+(?:\.\d+)?)\s*RWF from ([^(]+?)\s*\(([^)]+)\) on your mobile money account at ([\d\s:-]+)\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\.\s*Financial Transaction Id:\s*(\d+)",
        fields: &[F::Amount, F::CounterpartyName, F::CounterpartyPhone, F::Timestamp, F::NewBalance, F::ReferenceId],
    },
    // ── Agent cash-out ────────────────────────────────────────────
    ExtractionTemplate {
        name: "withdrawal_agent",
        category: Category::Withdrawal,
        pattern: r"You ([^(]+?)\s*\([^)]+\) have via agent:\s*([^(]+?)\s*\((\d+)\),\s*withdrawn ([\d,]+(?:\.\d+)?)\s*RWF from your mobile money account:\s*(\d+) at ([\d\s:-]+?) and you can now collect your money in cash\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\.\s*Fee paid:\s*([\d,]+)\s*RWF\.\s*Message from agent:\s*([^.]*)\.\s*Financial Transaction Id:\s*(\d+)",
        fields: &[F::AccountHolder, F::AgentName, F::AgentPhone, F::Amount, F::AccountPhone, F::Timestamp, F::NewBalance, F::Fee, F::Message, F::ReferenceId],
    },
    // ── Airtime and bundles ───────────────────────────────────────
    ExtractionTemplate {
        name: "airtime_ussd",
        category: Category::Airtime,
        pattern: r"\*162\*TxId:(\d+)\*S\*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to (Bundles and Packs|Airtime) with token\s*(\S*) and External Transaction Id:\s*(\S+) has been completed at ([\d\s:-]+)\.\s*Fee was\s*([\d,]+)\s*RWF\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\s*\.\s*Message:\s*([^*]*)",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::Token, F::ExternalReferenceId, F::Timestamp, F::Fee, F::NewBalance, F::Message],
    },
    ExtractionTemplate {
        name: "airtime_plain",
        category: Category::Airtime,
        pattern: r"TxId:(\d+)\*S\*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to (Bundles and Packs|Airtime) with token\s*(\S*) and External Transaction Id:\s*(\S+) has been completed at ([\d\s:-]+)\.\s*Fee was\s*([\d,]+)\s*RWF\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::Token, F::ExternalReferenceId, F::Timestamp, F::Fee, F::NewBalance],
    },
    // ── Prepaid electricity ───────────────────────────────────────
    ExtractionTemplate {
        name: "electricity_split_reference",
        category: Category::Electricity,
        pattern: r"\*162\*TxId:(\d+)\*S\*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to (.+?) with token ([\d-]+) and External Transaction Id:\s*(\S+)\s+(\S+) has been completed at ([\d\s:-]+)\.\s*Fee was\s*([\d,]+)\s*RWF\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\s*\.\s*Message:\s*-\s*Electricity units:\s*([\d.]+)\s*kwh",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::Token, F::ExternalReferenceId, F::ExternalReferenceSuffix, F::Timestamp, F::Fee, F::NewBalance, F::ElectricityUnits],
    },
    ExtractionTemplate {
        name: "electricity_single_reference",
        category: Category::Electricity,
        pattern: r"TxId:(\d+)\*S\*Your payment of ([\d,]+(?:\.\d+)?)\s*RWF to (.+?) with token ([\d-]+) and External Transaction Id:\s*(\S+) has been completed at ([\d\s:-]+)\.\s*Fee was\s*([\d,]+)\s*RWF\.\s*Your new balance:\s*([\d,]+(?:\.\d+)?)\s*RWF\s*\.\s*Message:\s*-\s*Electricity units:\s*([\d.]+)\s*kwh",
        fields: &[F::ReferenceId, F::Amount, F::CounterpartyName, F::Token, F::ExternalReferenceId, F::Timestamp, F::Fee, F::NewBalance, F::ElectricityUnits],
    },
];

/// A template with its pattern compiled (case-insensitive, dot matches newline).
pub struct CompiledTemplate {
    pub template: &'static ExtractionTemplate,
    regex: Regex,
}

static COMPILED: LazyLock<Vec<CompiledTemplate>> = LazyLock::new(|| {
    TEMPLATES
        .iter()
        .map(|template| CompiledTemplate {
            template,
            regex: Regex::new(&format!("(?is){}", template.pattern))
                .expect("extraction template pattern is valid"),
        })
        .collect()
});

/// Templates for `category`, in the order they must be tried.
pub fn templates_for(category: Category) -> impl Iterator<Item = &'static CompiledTemplate> {
    COMPILED
        .iter()
        .filter(move |c| c.template.category == category)
}

impl CompiledTemplate {
    /// Match the whole pattern against `text` and label the groups.
    pub fn capture<'t>(&self, text: &'t str) -> Option<Captured<'t>> {
        let caps = self.regex.captures(text)?;
        let values = self
            .template
            .fields
            .iter()
            .enumerate()
            .filter_map(|(i, role)| caps.get(i + 1).map(|m| (*role, m.as_str().trim())))
            .collect();
        Some(Captured {
            template: self.template.name,
            values,
        })
    }

    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }
}

/// Role-labelled captures of one successful template match.
#[derive(Debug)]
pub struct Captured<'t> {
    pub template: &'static str,
    values: HashMap<FieldRole, &'t str>,
}

impl<'t> Captured<'t> {
    /// Trimmed capture; empty captures count as absent.
    pub fn get(&self, role: FieldRole) -> Option<&'t str> {
        self.values.get(&role).copied().filter(|v| !v.is_empty())
    }

    pub fn optional_text(&self, role: FieldRole) -> Option<String> {
        self.get(role).map(str::to_string)
    }

    pub fn text(&self, role: FieldRole) -> Result<String, ExtractionError> {
        self.get(role)
            .map(str::to_string)
            .ok_or(ExtractionError::MissingField {
                template: self.template,
                role,
            })
    }

    pub fn amount(&self, role: FieldRole) -> Result<Amount, ExtractionError> {
        let raw = self.get(role).ok_or(ExtractionError::MissingField {
            template: self.template,
            role,
        })?;
        normalize_amount(raw).map_err(ExtractionError::from)
    }

    pub fn optional_amount(&self, role: FieldRole) -> Result<Option<Amount>, NormalizeError> {
        self.get(role).map(normalize_amount).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_maps_every_group() {
        for compiled in COMPILED.iter() {
            assert_eq!(
                compiled.group_count(),
                compiled.template.fields.len(),
                "template '{}' has a group/role mismatch",
                compiled.template.name
            );
        }
    }

    #[test]
    fn every_known_category_has_a_template() {
        for category in Category::ALL {
            let count = templates_for(category).count();
            if category == Category::Unknown {
                assert_eq!(count, 0);
            } else {
                assert!(count > 0, "no template for {category}");
            }
        }
    }

    #[test]
    fn template_names_are_unique() {
        let mut names: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TEMPLATES.len());
    }

    #[test]
    fn captured_values_are_trimmed_and_labelled() {
        let compiled = templates_for(Category::PaymentOut).next().unwrap();
        let text = "TxId: 1. Your payment of 5 RWF to Shop  9 has been completed at 2025-01-01 10:00:00. Your new balance: 7 RWF. Fee was 0 RWF.";
        let captured = compiled.capture(text).unwrap();
        assert_eq!(captured.get(F::CounterpartyName), Some("Shop"));
        assert_eq!(captured.get(F::CounterpartyCode), Some("9"));
        assert_eq!(captured.amount(F::NewBalance).unwrap(), crate::types::Amount::from(7));
    }
}

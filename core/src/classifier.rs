//! Notification classifier and extractor.
//!
//! `parse` never fails: every input yields a `ParsedTransaction`, and the
//! `parsed` flag tells the caller whether extraction succeeded.

use crate::{
    error::ExtractionError,
    normalize::{find_reference, parse_timestamp},
    notification::{Category, CategoryDetails, ParsedTransaction, TransactionFields},
    template::{templates_for, Captured, FieldRole},
    types::Amount,
};

/// Pick exactly one category from textual cues. First match wins; the
/// utility checks come before the generic payment cue because their text
/// is a superset of it.
pub fn classify(text: &str) -> Category {
    let lower = text.to_lowercase();
    let has = |cue: &str| lower.contains(cue);

    let is_payment = has("payment of") && has("to");
    if is_payment && (has("bundles and packs") || has("airtime")) {
        Category::Airtime
    } else if is_payment && (has("electricity units") || has("cash power")) {
        Category::Electricity
    } else if is_payment {
        Category::PaymentOut
    } else if has("you have received") {
        Category::PaymentIn
    } else if has("*165*s*") && has("transferred to") {
        Category::TransferOut
    } else if has("withdrawn") && has("agent") {
        Category::Withdrawal
    } else {
        Category::Unknown
    }
}

/// Extracted fields plus any soft warnings raised on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub fields: TransactionFields,
    pub warnings: Vec<String>,
}

/// Try each template of `category` in order; the first that matches and
/// yields the category's full field set wins.
pub fn extract(text: &str, category: Category) -> Result<Extraction, ExtractionError> {
    let mut last_error = None;
    for compiled in templates_for(category) {
        let Some(captured) = compiled.capture(text) else {
            continue;
        };
        match build(text, category, &captured) {
            Ok(extraction) => {
                log::debug!("classifier: '{}' matched", captured.template);
                return Ok(extraction);
            }
            Err(e) => {
                log::debug!("classifier: '{}' matched but failed: {e}", captured.template);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or(ExtractionError::NoTemplateMatched { category }))
}

fn build(
    text: &str,
    category: Category,
    captured: &Captured<'_>,
) -> Result<Extraction, ExtractionError> {
    use FieldRole as F;

    let amount = captured.amount(F::Amount)?;
    // Incoming transfers print no fee.
    let fee = if category == Category::PaymentIn {
        captured.optional_amount(F::Fee)?.unwrap_or(Amount::ZERO)
    } else {
        captured.amount(F::Fee)?
    };
    let new_balance = captured.amount(F::NewBalance)?;

    let timestamp = parse_timestamp(&captured.text(F::Timestamp)?);
    let warnings = timestamp
        .warning
        .iter()
        .map(ToString::to_string)
        .collect();

    let details = match category {
        Category::PaymentOut => CategoryDetails::PaymentOut {
            reference_id: captured.text(F::ReferenceId)?,
            counterparty_name: captured.text(F::CounterpartyName)?,
            counterparty_code: captured.optional_text(F::CounterpartyCode),
        },
        Category::TransferOut => CategoryDetails::TransferOut {
            reference_id: find_reference(text),
            counterparty_name: captured.text(F::CounterpartyName)?,
            counterparty_phone: captured.text(F::CounterpartyPhone)?,
            sender_account: captured.text(F::SenderAccount)?,
        },
        Category::PaymentIn => CategoryDetails::PaymentIn {
            reference_id: captured.text(F::ReferenceId)?,
            counterparty_name: captured.text(F::CounterpartyName)?,
            counterparty_phone: captured.optional_text(F::CounterpartyPhone),
            sender_message: captured.optional_text(F::Message),
        },
        Category::Withdrawal => CategoryDetails::Withdrawal {
            reference_id: captured.text(F::ReferenceId)?,
            account_holder: captured.text(F::AccountHolder)?,
            account_phone: captured.text(F::AccountPhone)?,
            agent_name: captured.text(F::AgentName)?,
            agent_phone: captured.text(F::AgentPhone)?,
            agent_message: captured.optional_text(F::Message),
        },
        Category::Airtime => CategoryDetails::Airtime {
            reference_id: captured.text(F::ReferenceId)?,
            product: captured.text(F::CounterpartyName)?,
            token: captured.optional_text(F::Token),
            external_reference_id: captured.text(F::ExternalReferenceId)?,
            message: captured.optional_text(F::Message),
        },
        Category::Electricity => {
            let head = captured.text(F::ExternalReferenceId)?;
            let external_reference_id = match captured.get(F::ExternalReferenceSuffix) {
                Some(tail) => format!("{head} {tail}"),
                None => head,
            };
            CategoryDetails::Electricity {
                reference_id: captured.text(F::ReferenceId)?,
                provider: captured.text(F::CounterpartyName)?,
                token: captured.text(F::Token)?,
                external_reference_id,
                electricity_units: captured.amount(F::ElectricityUnits)?,
            }
        }
        Category::Unknown => return Err(ExtractionError::NoTemplateMatched { category }),
    };

    Ok(Extraction {
        fields: TransactionFields {
            amount,
            fee,
            new_balance,
            occurred_at: timestamp.value,
            details,
        },
        warnings,
    })
}

/// Collapse line breaks into spaces and trim.
pub fn clean_text(raw_text: &str) -> String {
    raw_text.trim().replace('\r', "").replace('\n', " ")
}

/// Classify and extract one notification. Never fails.
pub fn parse(raw_text: &str) -> ParsedTransaction {
    let text = clean_text(raw_text);
    let category = classify(&text);

    match extract(&text, category) {
        Ok(extraction) => {
            ParsedTransaction::extracted(text, extraction.fields, extraction.warnings)
        }
        Err(e) => {
            log::warn!("classifier: could not extract {category} notification: {e}");
            let reference_id = find_reference(&text);
            let error = format!("Could not parse message type: {category} ({e})");
            ParsedTransaction::unparsed(text, category, reference_id, error)
        }
    }
}

/// Parse many notifications, preserving input order.
pub fn parse_batch<I, S>(texts: I) -> Vec<ParsedTransaction>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts.into_iter().map(|t| parse(t.as_ref())).collect()
}

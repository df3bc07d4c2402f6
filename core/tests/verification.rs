//! Detail verification of a matched transaction and the merchant-facing
//! recommendation.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use momo_core::{
    matcher::{match_reference, MatchType},
    notification::Category,
    record::TransactionRecord,
    types::Amount,
    verification::{verify_at, Verifier},
};
use std::str::FromStr;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 30).unwrap().and_hms_opt(19, 49, 59).unwrap()
}

fn record(category: Category, reference: &str, amount: i64, occurred_at: NaiveDateTime) -> TransactionRecord {
    TransactionRecord {
        id: format!("rec-{reference}"),
        category,
        reference_id: Some(reference.into()),
        external_reference_id: None,
        amount: Amount::from(amount),
        fee: Amount::ZERO,
        counterparty_name: Some("Assia Itangishaka".into()),
        counterparty_phone: None,
        counterparty_code: None,
        new_balance: Some(Amount::from(641)),
        occurred_at,
        sender_message: None,
        agent_name: None,
        agent_phone: None,
        token: None,
        electricity_units: None,
        raw_text: format!("TxId: {reference}."),
    }
}

#[test]
fn exact_fresh_matching_amount_is_verified() {
    let records = vec![record(Category::PaymentOut, "22004556853", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(1_100)), t0() + Duration::hours(1));
    assert!(outcome.verified);
    assert_eq!(outcome.confidence, 1.0);
    assert!(outcome.issues.is_empty());
    assert_eq!(outcome.reason, None);

    let summary = outcome.transaction.as_ref().unwrap();
    assert_eq!(summary.reference_id.as_deref(), Some("22004556853"));
    assert_eq!(summary.amount, Amount::from(1_100));
    assert_eq!(summary.category, Category::PaymentOut);

    let verifier = Verifier::default();
    assert_eq!(
        verifier.recommendation(&outcome),
        "Payment verified successfully - proceed with order"
    );
}

#[test]
fn fuzzy_match_verifies_with_caution() {
    let records = vec![record(Category::PaymentOut, "22004556854", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);
    assert_eq!(found.match_type, MatchType::High);

    let outcome = verify_at(&found, None, t0());
    assert!(outcome.verified);
    assert!((outcome.confidence - 10.0 / 11.0).abs() < 1e-9);
    assert_eq!(
        Verifier::default().recommendation(&outcome),
        "Payment likely verified - proceed with caution"
    );
}

#[test]
fn amount_mismatch_halves_confidence() {
    let records = vec![record(Category::PaymentOut, "22004556853", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(1_000)), t0());
    assert!(!outcome.verified);
    assert!((outcome.confidence - 0.5).abs() < 1e-9);
    assert_eq!(outcome.issues, vec!["Amount mismatch: expected 1000, found 1100".to_string()]);
    assert_eq!(
        Verifier::default().recommendation(&outcome),
        "Verification failed: Amount mismatch: expected 1000, found 1100"
    );
}

#[test]
fn amount_within_tolerance_passes() {
    let records = vec![record(Category::PaymentOut, "22004556853", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);

    let outcome = verify_at(&found, Some(Amount::from_str("1100.005").unwrap()), t0());
    assert!(outcome.verified, "issues: {:?}", outcome.issues);
}

#[test]
fn age_limit_is_exclusive() {
    let records = vec![record(Category::PaymentOut, "22004556853", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);

    let at_limit = verify_at(&found, None, t0() + Duration::hours(24));
    assert!(at_limit.verified, "exactly 24h is still fresh");

    let stale = verify_at(&found, None, t0() + Duration::hours(30));
    assert!(!stale.verified);
    assert!((stale.confidence - 0.8).abs() < 1e-9);
    assert_eq!(stale.issues, vec!["Transaction is 30.0 hours old".to_string()]);
}

#[test]
fn incoming_transfers_are_never_silently_verified() {
    let records = vec![record(Category::PaymentIn, "22147479754", 150_000, t0())];
    let found = match_reference("22147479754", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(150_000)), t0());
    assert!(!outcome.verified);
    assert!((outcome.confidence - 0.9).abs() < 1e-9);
    assert_eq!(
        outcome.issues,
        vec!["Transaction type 'payment_in' might not be a customer payment".to_string()]
    );
}

#[test]
fn penalties_compound_and_recommendation_lists_two_issues() {
    let records = vec![record(Category::PaymentIn, "22147479754", 150_000, t0())];
    let found = match_reference("22147479754", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(1)), t0() + Duration::hours(48));
    assert_eq!(outcome.issues.len(), 3);
    assert!((outcome.confidence - 0.5 * 0.8 * 0.9).abs() < 1e-9);

    let text = Verifier::default().recommendation(&outcome);
    assert!(text.starts_with("Verification failed: Amount mismatch"), "{text}");
    assert!(text.contains("48.0 hours old"), "{text}");
    assert!(!text.contains("payment_in"), "only the first two issues are listed: {text}");
}

#[test]
fn weak_match_without_issues_asks_for_review() {
    let at = t0();
    let records = vec![record(Category::PaymentOut, "22004556854", 1_100, at - Duration::minutes(5))];
    let found = match_reference("98765", &records, Some(at));
    assert_eq!(found.match_type, MatchType::TimeBased);

    let outcome = verify_at(&found, None, at);
    assert!(!outcome.verified);
    assert!(outcome.issues.is_empty());
    assert_eq!(
        Verifier::default().recommendation(&outcome),
        "Verification failed - manual review recommended"
    );
}

#[test]
fn no_match_reports_a_reason() {
    let records = vec![record(Category::PaymentOut, "22004556853", 1_100, t0())];
    let found = match_reference("98765", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(1_100)), t0());
    assert!(!outcome.verified);
    assert!(!outcome.matched);
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.reason.as_deref(), Some("No transaction match found"));
    assert!(outcome.transaction.is_none());

    let verifier = Verifier::default();
    let report = verifier.report("98765", &found, &outcome);
    assert!(!report.match_found);
    assert_eq!(report.match_type, MatchType::NoMatch);
    assert!(!report.verification_passed);
    assert_eq!(
        report.recommendation,
        "Transaction not found - request customer to check TxID or try again later"
    );
}

#[test]
fn report_carries_match_and_verification_sides() {
    let records = vec![record(Category::PaymentOut, "22004556854", 1_100, t0())];
    let found = match_reference("22004556853", &records, None);
    let verifier = Verifier::default();
    let outcome = verifier.verify_at(&found, Some(Amount::from(900)), t0());

    let report = verifier.report("22004556853", &found, &outcome);
    assert_eq!(report.reference, "22004556853");
    assert!(report.match_found);
    assert_eq!(report.match_type, MatchType::High);
    assert_eq!(report.match_details, found.details);
    assert!(!report.verification_passed);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.transaction.unwrap().reference_id.as_deref(), Some("22004556854"));

    let json = serde_json::to_value(&verifier.report("22004556853", &found, &outcome)).unwrap();
    assert_eq!(json["match_type"], "high");
}

#[test]
fn amount_difference_beyond_decimal_range_is_a_mismatch() {
    let mut huge = record(Category::PaymentOut, "22004556853", 0, t0());
    huge.amount = Amount::MAX;
    let records = vec![huge];
    let found = match_reference("22004556853", &records, None);

    let outcome = verify_at(&found, Some(Amount::from(-1)), t0());
    assert!(!outcome.verified);
    assert!((outcome.confidence - 0.5).abs() < 1e-9);
    assert_eq!(outcome.issues.len(), 1);
    assert!(outcome.issues[0].starts_with("Amount mismatch"), "{:?}", outcome.issues);

    let outcome = verify_at(&found, Some(Amount::MIN), t0());
    assert!(!outcome.verified);
}

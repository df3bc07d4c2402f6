//! Risk scoring: individual checks, aggregation and the multi-alert boost.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use momo_core::{
    check::{RiskCheck, RiskContext},
    classifier::parse,
    config::RiskConfig,
    notification::{Category, CategoryDetails, ParsedTransaction, TransactionFields},
    record::TransactionRecord,
    risk::{assess_risk, Alert, AlertKind, FraudReport, RiskEngine, RiskLevel, Severity},
    types::{Amount, Timestamp},
};

const PAYMENT_OUT: &str = "TxId: 22004556853. Your payment of 1,100 RWF to Assia Itangishaka 047700 has been completed at 2025-07-30 19:49:59. Your new balance: 641 RWF. Fee was 0 RWF.";
const PAYMENT_IN: &str = "You have received 150000 RWF from Alphonsine NYIRANZAKIZWANAYO (***361) on your mobile money account at 2025-08-07 10:04:31. Message from sender: . Your new balance:150041 RWF. Financial Transaction Id: 22147479754.";
const TRANSFER_OUT: &str = "*165*S*100 RWF transferred to Jeannette MUKARUSINE (250788953573) from 27827750 at 2025-07-30 16:30:40 . Fee was: 20 RWF. New balance: 1741 RWF. Kugura ama inite cg interineti kuri MoMo, Kanda *182*2*1# .*EN#";
const ELECTRICITY: &str = "*162*TxId:22151988166*S*Your payment of 20000 RWF to MTN Cash Power with token 10988-19437-05970-52010 and External Transaction Id: 10988-19437-05970-52010 a1bde4d7-ff2f-3548-8580-3d85b9cb0351 has been completed at 2025-08-07 14:08:02. Fee was 0 RWF. Your new balance: 153041 RWF . Message: - Electricity units: 82.7kwH.. *EN#";

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
}

fn payment(amount: &str, when: &str) -> ParsedTransaction {
    let text = format!(
        "TxId: 22004556853. Your payment of {amount} RWF to Assia Itangishaka 047700 has been completed at {when}. Your new balance: 50,000 RWF. Fee was 0 RWF."
    );
    let txn = parse(&text);
    assert!(txn.parsed, "fixture must parse: {:?}", txn.error);
    txn
}

fn record(id: &str, reference: &str, amount: i64, occurred_at: NaiveDateTime) -> TransactionRecord {
    TransactionRecord {
        id: id.into(),
        category: Category::PaymentOut,
        reference_id: Some(reference.into()),
        external_reference_id: None,
        amount: Amount::from(amount),
        fee: Amount::ZERO,
        counterparty_name: Some("Assia Itangishaka".into()),
        counterparty_phone: None,
        counterparty_code: None,
        new_balance: None,
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
fn genuine_notifications_raise_nothing() {
    for text in [PAYMENT_OUT, PAYMENT_IN, TRANSFER_OUT, ELECTRICITY] {
        let txn = parse(text);
        let assessment = assess_risk(&txn, &[], &[]);
        // 150000 in is a large round amount and 100 out is a test amount.
        let unexpected: Vec<&Alert> = assessment
            .alerts
            .iter()
            .filter(|a| a.kind != AlertKind::AmountPattern)
            .collect();
        assert!(unexpected.is_empty(), "unexpected alerts for {text}: {unexpected:?}");
        assert!(!assessment.has_alert(AlertKind::MessageTampering));
    }

    let clean = assess_risk(&parse(PAYMENT_OUT), &[], &[]);
    assert_eq!(clean.overall, 0.0);
    assert_eq!(clean.level, RiskLevel::Safe);
    assert!(!clean.should_block);
    assert_eq!(clean.recommendation(), "Proceed normally");
}

#[test]
fn large_late_night_payment_is_flagged_but_not_blocked() {
    let txn = payment("150,000", "2025-08-15 02:30:00");
    let history = vec![
        record("h1", "1", 1000, at(2025, 8, 14, 12, 0)),
        record("h2", "2", 2000, at(2025, 8, 13, 12, 0)),
        record("h3", "3", 1500, at(2025, 8, 12, 12, 0)),
    ];

    let assessment = assess_risk(&txn, &history, &[]);

    assert!(assessment.has_alert(AlertKind::UnusualAmount));
    assert!(assessment.has_alert(AlertKind::SuspiciousTiming));
    assert!(assessment.has_alert(AlertKind::AmountPattern));
    assert_eq!(assessment.alerts.len(), 3, "alerts: {:?}", assessment.alerts);

    let unusual = assessment.alerts.iter().find(|a| a.kind == AlertKind::UnusualAmount).unwrap();
    assert!((unusual.score - 0.9).abs() < 1e-9, "unusual amount is capped at 0.9");
    assert_eq!(unusual.severity, Severity::High);

    // mean(0.9, 0.6, 0.7) * 1.2
    let expected = (0.9 + 0.6 + 0.7) / 3.0 * 1.2;
    assert!((assessment.overall - expected).abs() < 1e-9, "overall {}", assessment.overall);
    assert_eq!(assessment.level, RiskLevel::High);
    assert!(!assessment.should_block);
    assert_eq!(assessment.recommendation(), "Flag for manual review before processing");
}

#[test]
fn duplicate_reference_is_critical() {
    let txn = parse(PAYMENT_OUT);
    let t = at(2025, 7, 30, 19, 49);
    let existing = vec![
        record("a", "22004556853", 1100, t),
        record("b", "22004556853", 1100, t),
    ];

    let assessment = assess_risk(&txn, &[], &existing);
    let alert = &assessment.alerts[0];
    assert_eq!(alert.kind, AlertKind::DuplicateReference);
    assert_eq!(alert.severity, Severity::Critical);
    assert!((alert.score - 0.9).abs() < 1e-9);
    assert!(alert.description.contains("2 times"), "{}", alert.description);

    // A single copy on file is the transaction itself.
    let single = assess_risk(&txn, &[], &existing[..1]);
    assert!(!single.has_alert(AlertKind::DuplicateReference));
}

#[test]
fn rapid_transactions_count_only_the_preceding_window() {
    let txn = parse(PAYMENT_OUT);
    let ts = txn.occurred_at().unwrap();

    let mut history: Vec<TransactionRecord> = (0..4)
        .map(|i| record(&format!("r{i}"), &format!("9{i}"), 1000, ts - Duration::minutes(i)))
        .collect();
    // Exactly five minutes back is outside; after the transaction is outside.
    history.push(record("edge", "80", 1000, ts - Duration::minutes(5)));
    history.push(record("later", "81", 1000, ts + Duration::minutes(1)));

    let quiet = assess_risk(&txn, &history, &[]);
    assert!(!quiet.has_alert(AlertKind::RapidTransactions), "four in window must not fire");

    history.push(record("r4", "94", 1000, ts - Duration::seconds(30)));
    let busy = assess_risk(&txn, &history, &[]);
    let alert = busy.alerts.iter().find(|a| a.kind == AlertKind::RapidTransactions).unwrap();
    assert!((alert.score - 0.75).abs() < 1e-9, "5 * 0.15, got {}", alert.score);
    assert_eq!(alert.severity, Severity::High);
}

#[test]
fn suspicious_hours_are_inclusive() {
    for (hour, fires) in [(1, false), (2, true), (5, true), (6, false)] {
        let txn = payment("1,100", &format!("2025-08-15 {hour:02}:59:00"));
        let assessment = assess_risk(&txn, &[], &[]);
        assert_eq!(
            assessment.has_alert(AlertKind::SuspiciousTiming),
            fires,
            "hour {hour}"
        );
    }
}

#[test]
fn round_amount_wins_over_test_amount() {
    let round = assess_risk(&payment("50,000", "2025-08-15 12:00:00"), &[], &[]);
    assert_eq!(round.alerts.len(), 1);
    assert!((round.alerts[0].score - 0.7).abs() < 1e-9);
    assert_eq!(round.alerts[0].severity, Severity::Medium);

    let small = assess_risk(&payment("100", "2025-08-15 12:00:00"), &[], &[]);
    assert_eq!(small.alerts.len(), 1);
    assert!((small.alerts[0].score - 0.4).abs() < 1e-9);
    assert_eq!(small.alerts[0].severity, Severity::Low);
    assert_eq!(small.level, RiskLevel::Low);
    assert_eq!(small.recommendation(), "Proceed with caution and log");

    let not_round = assess_risk(&payment("50,500", "2025-08-15 12:00:00"), &[], &[]);
    assert!(not_round.alerts.is_empty());
}

#[test]
fn negative_balance_after_outgoing_payment() {
    let fields = TransactionFields {
        amount: Amount::from(5_000),
        fee: Amount::ZERO,
        new_balance: Amount::from(-250),
        occurred_at: at(2025, 8, 15, 12, 0),
        details: CategoryDetails::PaymentOut {
            reference_id: "22000000001".into(),
            counterparty_name: "Shop".into(),
            counterparty_code: None,
        },
    };
    let txn = ParsedTransaction::extracted("TxId: 22000000001.".into(), fields, Vec::new());

    let assessment = assess_risk(&txn, &[], &[]);
    assert!(assessment.has_alert(AlertKind::BalanceInconsistency));
    let alert = &assessment.alerts[0];
    assert_eq!(alert.severity, Severity::Critical);
}

#[test]
fn repeated_currency_marker_looks_tampered() {
    let text = format!("{PAYMENT_OUT} RWF");
    let txn = parse(&text);
    let assessment = assess_risk(&txn, &[], &[]);

    let alert = assessment.alerts.iter().find(|a| a.kind == AlertKind::MessageTampering).unwrap();
    assert_eq!(alert.severity, Severity::High);
    assert!((alert.score - 0.8).abs() < 1e-9);
    assert!(alert.description.contains("currency"), "{}", alert.description);
}

#[test]
fn excess_decimals_look_tampered() {
    let txn = payment("1,100.500", "2025-08-15 12:00:00");
    let assessment = assess_risk(&txn, &[], &[]);
    assert!(assessment.has_alert(AlertKind::MessageTampering));
}

#[test]
fn unparsed_input_scores_zero() {
    let assessment = assess_risk(&parse(""), &[], &[]);
    assert!(assessment.alerts.is_empty());
    assert_eq!(assessment.overall, 0.0);
    assert_eq!(assessment.level, RiskLevel::Safe);
}

struct AlwaysFires(f64);

impl RiskCheck for AlwaysFires {
    fn name(&self) -> &'static str {
        "always_fires"
    }

    fn evaluate(&self, _ctx: &RiskContext<'_>) -> Option<Alert> {
        Some(Alert::new(AlertKind::PhoneMismatch, self.0, Severity::High, "test".into()))
    }
}

#[test]
fn registered_checks_join_the_bank_and_boost_applies() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    assert_eq!(engine.check_names().len(), 7);

    engine.register(Box::new(AlwaysFires(0.9)));
    engine.register(Box::new(AlwaysFires(0.9)));
    assert_eq!(engine.check_names().last(), Some(&"always_fires"));

    let txn = parse(PAYMENT_OUT);
    let assessment = engine.assess(&txn, &[], &[]);
    assert_eq!(assessment.alerts.len(), 2);
    // 0.9 * 1.2 = 1.08, capped.
    assert_eq!(assessment.overall, 1.0);
    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.should_block);
    assert_eq!(assessment.recommendation(), "Block transaction and require manual review");

    let report = FraudReport::new(&txn, &assessment);
    assert_eq!(report.alerts_count, 2);
    assert_eq!(report.reference_id.as_deref(), Some("22004556853"));
    assert!(report.should_block);
}

#[test]
fn boost_never_lowers_the_mean() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    engine.register(Box::new(AlwaysFires(0.5)));
    // Adds timing (0.6) to the always-on 0.5.
    let txn = payment("1,100", "2025-08-15 03:00:00");
    let assessment = engine.assess(&txn, &[], &[]);

    let mean = assessment.alerts.iter().map(|a| a.score).sum::<f64>() / assessment.alerts.len() as f64;
    assert_eq!(assessment.alerts.len(), 2);
    assert!(assessment.overall >= mean);
    assert!((assessment.overall - mean * 1.2).abs() < 1e-9);
}

#[test]
fn overall_never_drops_while_each_new_alert_is_at_least_the_mean() {
    let scores = [0.3, 0.5, 0.6, 0.75, 0.9, 0.9];
    let txn = parse(PAYMENT_OUT);
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut previous = 0.0;
    for score in scores {
        engine.register(Box::new(AlwaysFires(score)));
        let assessment = engine.assess(&txn, &[], &[]);
        assert!(
            assessment.overall >= previous,
            "overall fell from {previous} to {} after adding {score}",
            assessment.overall
        );
        previous = assessment.overall;
    }
}

#[test]
fn weak_alert_joining_a_strong_one_lowers_the_mean() {
    // Aggregation is boost(mean), so a low score dilutes a high one.
    let txn = parse(PAYMENT_OUT);
    let mut engine = RiskEngine::new(RiskConfig::default());
    engine.register(Box::new(AlwaysFires(0.9)));
    let alone = engine.assess(&txn, &[], &[]);
    assert!((alone.overall - 0.9).abs() < 1e-9);

    engine.register(Box::new(AlwaysFires(0.4)));
    let diluted = engine.assess(&txn, &[], &[]);
    assert!((diluted.overall - 0.65 * 1.2).abs() < 1e-9);
    assert!(diluted.overall < alone.overall);
    assert_eq!(diluted.level, RiskLevel::Medium);
}

#[test]
fn earliest_representable_time_does_not_overflow_windows() {
    let earliest = Timestamp::MIN;
    let txn = ParsedTransaction::extracted(
        "TxId: 22004556853.".into(),
        TransactionFields {
            amount: Amount::from(1_100),
            fee: Amount::ZERO,
            new_balance: Amount::from(641),
            occurred_at: earliest,
            details: CategoryDetails::PaymentOut {
                reference_id: "22004556853".into(),
                counterparty_name: "Assia Itangishaka".into(),
                counterparty_code: None,
            },
        },
        Vec::new(),
    );
    let history: Vec<TransactionRecord> = (0..5)
        .map(|i| record(&format!("rec-{i}"), &format!("2200455600{i}"), 1_000, earliest))
        .collect();

    let assessment = assess_risk(&txn, &history, &[]);
    assert!(assessment.alerts.iter().any(|a| a.kind == AlertKind::RapidTransactions));
}

#[test]
fn far_out_of_range_date_in_text_is_assessed_safely() {
    let text = TRANSFER_OUT.replace("2025-07-30 16:30:40", "-262143-01-01 00:00:00");
    let txn = parse(&text);
    assert!(txn.parsed, "{:?}", txn.error);
    assert_eq!(txn.warnings.len(), 1);

    let history = vec![record("rec-1", "22004556853", 1_000, at(2025, 7, 30, 16, 0))];
    let assessment = assess_risk(&txn, &history, &history);
    assert!(assessment.overall <= 1.0);
}

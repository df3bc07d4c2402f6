//! momo-runner: headless runner for the momo desk.
//!
//! Usage:
//!   momo-runner --db desk.db --file notifications.txt
//!   momo-runner --db desk.db --generate 200 --seed 12345
//!   momo-runner --db desk.db --config data/config/engine.json --ipc-mode

use anyhow::Result;
use chrono::Duration;
use momo_core::{
    config::EngineConfig,
    engine::{DeskEngine, ProcessingReport, VerificationRequest},
    normalize::try_parse_timestamp,
    notification::RawNotification,
    sample::NotificationGenerator,
    store::DeskStore,
    types::{Amount, Timestamp},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Process {
        message: String,
        sender: Option<String>,
        timestamp: Option<String>,
    },
    Verify {
        reference: String,
        verification_code: String,
        expected_amount: Option<Amount>,
    },
    Recent {
        hours: Option<i64>,
        limit: Option<usize>,
    },
    Search {
        reference: String,
    },
    Stats,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let generate = parse_arg(&args, "--generate", 0usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let file = string_arg(&args, "--file");
    let config = match string_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if !ipc_mode {
        println!("momo desk runner");
        println!("  db:        {db}");
        println!("  seed:      {seed}");
        println!();
    }

    let store = DeskStore::open(db)?;
    let engine = DeskEngine::build(store, config)?;

    if ipc_mode {
        run_ipc_loop(&engine, io::stdin().lock(), &mut io::stdout())?;
    } else if let Some(path) = file {
        process_file(&engine, path)?;
        print_summary(&engine)?;
    } else if generate > 0 {
        process_generated(&engine, generate, seed)?;
        print_summary(&engine)?;
    } else {
        eprintln!("nothing to do: pass --file, --generate or --ipc-mode");
    }

    Ok(())
}

fn now() -> Timestamp {
    chrono::Local::now().naive_local()
}

fn process_file(engine: &DeskEngine, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let received_at = now();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let report = engine.process_notification(&RawNotification {
            text: line.to_string(),
            sender: "file".into(),
            received_at,
        })?;
        print_report(&report);
    }
    Ok(())
}

fn process_generated(engine: &DeskEngine, n: usize, seed: u64) -> Result<()> {
    // Start far enough back that the batch ends around now.
    let span = Duration::try_minutes((n as i64).saturating_mul(90)).unwrap_or(Duration::MAX);
    let start = now().checked_sub_signed(span).unwrap_or(Timestamp::MIN);
    let mut generator = NotificationGenerator::new(seed, start);
    for sample in generator.batch(n) {
        let report = engine.process_notification(&RawNotification {
            text: sample.text,
            sender: "generator".into(),
            received_at: sample.occurred_at,
        })?;
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ProcessingReport) {
    match (&report.record_id, &report.fraud) {
        (Some(id), Some(fraud)) => println!(
            "  {id}  {:<12} risk={:.2} {:<8} alerts={}",
            report.parsed.category.as_str(),
            fraud.risk_score,
            fraud.risk_level.as_str(),
            fraud.alerts_count
        ),
        _ => println!(
            "  rejected: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn print_summary(engine: &DeskEngine) -> Result<()> {
    let stats = engine.stats()?;
    println!();
    println!("=== Summary ===");
    println!("  transactions:        {}", stats.total_transactions);
    println!("  received last 24h:   {}", stats.recent_transactions_24h);
    for entry in &stats.by_category {
        println!("    {:<14} {}", entry.category.as_str(), entry.count);
    }
    println!("  verifications:       {}", stats.total_verifications);
    println!("  success rate:        {:.1}%", stats.verification_success_rate);
    Ok(())
}

/// One JSON command per input line, one JSON reply per output line.
/// Stops at EOF or on `quit`.
fn run_ipc_loop<R: BufRead, W: Write>(engine: &DeskEngine, mut input: R, output: &mut W) -> Result<()> {
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = input.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(output, "{}", err_json)?;
                output.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(output, "{}", reply)?;
        output.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &DeskEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let reply = match cmd {
        IpcCommand::Process { message, sender, timestamp } => {
            let received_at = match timestamp.as_deref().map(try_parse_timestamp) {
                Some(Ok(ts)) => ts,
                Some(Err(e)) => {
                    log::warn!("runner: {e}, using current time");
                    now()
                }
                None => now(),
            };
            let report = engine.process_notification(&RawNotification {
                text: message,
                sender: sender.unwrap_or_else(|| "Unknown".into()),
                received_at,
            })?;
            serde_json::to_value(report)?
        }
        IpcCommand::Verify { reference, verification_code, expected_amount } => {
            let report = engine.verify_payment(&VerificationRequest {
                reference,
                verification_code,
                expected_amount,
                requested_at: now(),
            })?;
            serde_json::to_value(report)?
        }
        IpcCommand::Recent { hours, limit } => {
            let hours = hours.unwrap_or(engine.config().service.recent_window_hours);
            let transactions = engine.recent(hours, Some(limit.unwrap_or(50)))?;
            serde_json::json!({ "count": transactions.len(), "transactions": transactions })
        }
        IpcCommand::Search { reference } => {
            let transactions = engine.search(&reference)?;
            serde_json::json!({ "count": transactions.len(), "transactions": transactions })
        }
        IpcCommand::Stats => serde_json::to_value(engine.stats()?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(reply)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

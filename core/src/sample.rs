//! Deterministic synthetic notifications.
//!
//! RULE: Same seed, same start time, same sequence. Nothing here calls a
//! platform RNG; all randomness flows through one seeded Pcg64Mcg.
//! Generated text follows the operator's real layouts closely enough that
//! every notification classifies and extracts back to its own category.

use crate::{
    notification::Category,
    types::{Amount, Timestamp, TIMESTAMP_FORMAT},
};
use chrono::Duration;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

/// Categories the generator can produce, in selection order.
/// NEVER reorder: the index feeds the RNG stream.
pub const GENERATED_CATEGORIES: [Category; 6] = [
    Category::PaymentOut,
    Category::TransferOut,
    Category::PaymentIn,
    Category::Withdrawal,
    Category::Airtime,
    Category::Electricity,
];

const FIRST_NAMES: &[&str] = &[
    "Assia", "Jeannette", "Alphonsine", "Eric", "Claudine", "Jean Paul", "Aline",
    "Patrick", "Diane", "Emmanuel", "Grace", "Olivier", "Solange", "Innocent",
    "Vestine", "Fabrice", "Josiane", "Theogene", "Chantal", "Didier",
];

const LAST_NAMES: &[&str] = &[
    "Itangishaka", "MUKARUSINE", "NYIRANZAKIZWANAYO", "Habimana", "Uwimana",
    "Niyonsenga", "Mugisha", "Ingabire", "Nshimiyimana", "Uwase", "Hakizimana",
    "Mukamana", "Bizimana", "Umutoni", "Ndayisaba",
];

const SENDER_MESSAGES: &[&str] = &["", "Rent", "School fees", "Thanks", "Goods"];

/// One generated notification with the values it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedNotification {
    pub category: Category,
    pub reference_id: Option<String>,
    pub amount: Amount,
    pub occurred_at: Timestamp,
    pub text: String,
}

pub struct NotificationGenerator {
    rng: Pcg64Mcg,
    clock: Timestamp,
    next_reference: u64,
    balance: i64,
}

impl NotificationGenerator {
    pub fn new(seed: u64, start: Timestamp) -> Self {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let next_reference = rng.gen_range(22_000_000_000..22_200_000_000);
        let balance = rng.gen_range(50_000..500_000);
        Self {
            rng,
            clock: start,
            next_reference,
            balance,
        }
    }

    /// Next notification of a randomly chosen category.
    pub fn next_notification(&mut self) -> GeneratedNotification {
        let index = self.rng.gen_range(0..GENERATED_CATEGORIES.len());
        self.next_of(GENERATED_CATEGORIES[index])
    }

    pub fn batch(&mut self, n: usize) -> Vec<GeneratedNotification> {
        (0..n).map(|_| self.next_notification()).collect()
    }

    /// Next notification of `category`. `Unknown` yields free text.
    pub fn next_of(&mut self, category: Category) -> GeneratedNotification {
        self.clock += Duration::minutes(self.rng.gen_range(1..=90));
        let at = self.clock;
        let ts = at.format(TIMESTAMP_FORMAT).to_string();

        let (reference_id, amount, text) = match category {
            Category::PaymentOut => {
                let id = self.reference();
                let amount = self.amount(100, 60_000);
                let fee = 0;
                let balance = self.debit(amount + fee);
                let payee = self.full_name();
                let text = if self.rng.gen_bool(0.7) {
                    let code = format!("{:06}", self.rng.gen_range(0..1_000_000));
                    format!(
                        "TxId: {id}. Your payment of {} RWF to {payee} {code} has been completed at {ts}. \
                         Your new balance: {} RWF. Fee was {fee} RWF.",
                        grouped(amount),
                        grouped(balance)
                    )
                } else {
                    format!(
                        "TxId: {id}. Your payment of {} RWF to {payee} has been completed at {ts}. \
                         Your new balance: {} RWF. Fee was {fee} RWF.",
                        grouped(amount),
                        grouped(balance)
                    )
                };
                (Some(id), amount, text)
            }
            Category::TransferOut => {
                let amount = self.amount(100, 100_000);
                let fee = if amount > 1_000 { 100 } else { 20 };
                let balance = self.debit(amount + fee);
                let payee = self.full_name();
                let phone = self.phone();
                let account = self.rng.gen_range(10_000_000..99_999_999);
                let text = format!(
                    "*165*S*{} RWF transferred to {payee} ({phone}) from {account} at {ts} . \
                     Fee was: {fee} RWF. New balance: {} RWF. \
                     Kugura ama inite cg interineti kuri MoMo, Kanda *182*2*1# .*EN#",
                    grouped(amount),
                    grouped(balance)
                );
                (None, amount, text)
            }
            Category::PaymentIn => {
                let id = self.reference();
                let amount = self.amount(500, 200_000);
                self.balance += amount;
                let payer = self.full_name();
                let masked = format!("*********{:03}", self.rng.gen_range(0..1_000));
                let message = self.pick(SENDER_MESSAGES);
                let text = format!(
                    "You have received {amount} RWF from {payer} ({masked}) on your mobile money account at {ts}. \
                     Message from sender: {message}. Your new balance:{} RWF. Financial Transaction Id: {id}.",
                    self.balance
                );
                (Some(id), amount, text)
            }
            Category::Withdrawal => {
                let id = self.reference();
                let amount = self.amount(1_000, 80_000);
                let fee = 350;
                let balance = self.debit(amount + fee);
                let holder = self.full_name();
                let agent = self.full_name();
                let agent_phone = self.phone();
                let account = self.phone();
                let masked = format!("*********{:03}", self.rng.gen_range(0..1_000));
                let text = format!(
                    "You {holder} ({masked}) have via agent: {agent} ({agent_phone}), withdrawn {} RWF \
                     from your mobile money account: {account} at {ts} and you can now collect your money in cash. \
                     Your new balance: {} RWF. Fee paid: {fee} RWF. Message from agent: 1. \
                     Financial Transaction Id: {id}.",
                    grouped(amount),
                    grouped(balance)
                );
                (Some(id), amount, text)
            }
            Category::Airtime => {
                let id = self.reference();
                let amount = self.amount(100, 5_000);
                let balance = self.debit(amount);
                let product = if self.rng.gen_bool(0.5) { "Bundles and Packs" } else { "Airtime" };
                let external = self.rng.gen_range(10_000_000u64..99_999_999);
                let text = format!(
                    "*162*TxId:{id}*S*Your payment of {} RWF to {product} with token  and \
                     External Transaction Id: {external} has been completed at {ts}. Fee was 0 RWF. \
                     Your new balance: {} RWF . Message: Bundle activated. *EN#",
                    grouped(amount),
                    grouped(balance)
                );
                (Some(id), amount, text)
            }
            Category::Electricity => {
                let id = self.reference();
                let amount = self.amount(1_000, 50_000);
                let balance = self.debit(amount);
                let token = self.token();
                let order = self.hex_uuid();
                let units = amount as f64 / 242.0;
                let text = format!(
                    "*162*TxId:{id}*S*Your payment of {amount} RWF to MTN Cash Power with token {token} and \
                     External Transaction Id: {token} {order} has been completed at {ts}. Fee was 0 RWF. \
                     Your new balance: {balance} RWF . Message: - Electricity units: {units:.1}kwH.. *EN#"
                );
                (Some(id), amount, text)
            }
            Category::Unknown => {
                let text = format!("Dear customer, your MoMo PIN was changed at {ts}. Call 100 for help.");
                (None, 0, text)
            }
        };

        GeneratedNotification {
            category,
            reference_id,
            amount: Amount::from(amount),
            occurred_at: at,
            text,
        }
    }

    // ── Draws ──────────────────────────────────────────────────

    fn reference(&mut self) -> String {
        self.next_reference += self.rng.gen_range(1..5_000);
        self.next_reference.to_string()
    }

    /// Whole-franc amount, rounded to 50 above 1,000.
    fn amount(&mut self, min: i64, max: i64) -> i64 {
        let raw = self.rng.gen_range(min..=max);
        if raw > 1_000 {
            raw - raw % 50
        } else {
            raw
        }
    }

    /// Take `total` off the running balance, topping it up first when short.
    fn debit(&mut self, total: i64) -> i64 {
        if self.balance < total {
            self.balance += total + self.rng.gen_range(10_000..200_000);
        }
        self.balance -= total;
        self.balance
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items[self.rng.gen_range(0..items.len())]
    }

    fn full_name(&mut self) -> String {
        let first = self.pick(FIRST_NAMES);
        let last = self.pick(LAST_NAMES);
        format!("{first} {last}")
    }

    fn phone(&mut self) -> String {
        format!("25078{:07}", self.rng.gen_range(0..10_000_000))
    }

    fn token(&mut self) -> String {
        let groups: Vec<String> = (0..4)
            .map(|_| format!("{:05}", self.rng.gen_range(0..100_000)))
            .collect();
        groups.join("-")
    }

    fn hex_uuid(&mut self) -> String {
        let bytes: [u8; 16] = self.rng.gen();
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

/// 1234567 -> "1,234,567".
fn grouped(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

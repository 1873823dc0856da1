//! Synthetic Transaction Generator
//!
//! Writes a PaySim-shaped transaction CSV so the training pipeline and the
//! dashboard can be exercised without the original dataset.
//!
//! Usage: generate-transactions [output] [count] [fraud_rate] [seed]

use anyhow::{ensure, Context, Result};
use fraud_model_pipeline::Transaction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::info;

/// Legacy rule: transfers above this amount are flagged
const FLAGGED_TRANSFER_AMOUNT: f64 = 200_000.0;

struct TransactionGenerator {
    rng: StdRng,
    counter: u64,
}

impl TransactionGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            counter: 0,
        }
    }

    fn customer(&mut self) -> String {
        format!("C{}", self.rng.gen_range(100_000_000u64..2_000_000_000))
    }

    fn merchant(&mut self) -> String {
        format!("M{}", self.rng.gen_range(100_000_000u64..2_000_000_000))
    }

    fn step(&mut self) -> f64 {
        self.counter += 1;
        (1 + self.counter / 500).min(743) as f64
    }

    /// Ordinary customer activity across all five transaction types
    fn generate_legitimate(&mut self) -> Transaction {
        let step = self.step();
        let kind = ["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "TRANSFER"][self.rng.gen_range(0..5)];
        let old_org = (self.rng.gen_range(0.0..200_000.0_f64)).round();
        let old_dest = (self.rng.gen_range(0.0..500_000.0_f64)).round();

        let (amount, new_org, dest, new_dest) = match kind {
            "CASH_IN" => {
                let amount = self.rng.gen_range(100.0..100_000.0_f64).round();
                (amount, old_org + amount, self.customer(), (old_dest - amount).max(0.0))
            }
            "PAYMENT" => {
                let amount = self.rng.gen_range(10.0..20_000.0_f64).round();
                // merchants carry no balance information
                (amount, (old_org - amount).max(0.0), self.merchant(), 0.0)
            }
            _ => {
                let amount = self.rng.gen_range(10.0..150_000.0_f64).round().min(old_org.max(10.0));
                (amount, (old_org - amount).max(0.0), self.customer(), old_dest + amount)
            }
        };
        let old_dest = if dest.starts_with('M') { 0.0 } else { old_dest };

        let mut tx = Transaction::new(kind, amount)
            .with_balances(old_org, new_org, old_dest, new_dest)
            .with_label(0);
        tx.step = step;
        tx.name_orig = self.customer();
        tx.name_dest = dest;
        tx
    }

    /// Account takeover: the full balance is moved out by TRANSFER or CASH_OUT
    fn generate_fraud(&mut self) -> Transaction {
        let step = self.step();
        let kind = if self.rng.gen_bool(0.5) { "TRANSFER" } else { "CASH_OUT" };
        let amount = self.rng.gen_range(1_000.0..2_000_000.0_f64).round();
        let old_dest = if self.rng.gen_bool(0.5) {
            0.0
        } else {
            self.rng.gen_range(0.0..1_000_000.0_f64).round()
        };

        let mut tx = Transaction::new(kind, amount)
            .with_balances(amount, 0.0, old_dest, old_dest + amount)
            .with_label(1);
        tx.step = step;
        tx.name_orig = self.customer();
        tx.name_dest = self.customer();
        if kind == "TRANSFER" && amount > FLAGGED_TRANSFER_AMOUNT {
            tx.is_flagged_fraud = Some(1);
        }
        tx
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "generate_transactions=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = PathBuf::from(args.get(1).map(|s| s.as_str()).unwrap_or("data/Fraud.csv"));
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.01);
    let seed: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(42);

    ensure!(
        (0.0..=1.0).contains(&fraud_rate),
        "fraud_rate must be within [0, 1], got {}",
        fraud_rate
    );

    info!(
        output = %output.display(),
        count,
        fraud_rate,
        seed,
        "Generating synthetic transactions"
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut generator = TransactionGenerator::new(seed);
    let mut fraud_count = 0u64;

    for i in 0..count {
        let transaction = if generator.rng.gen_bool(fraud_rate) {
            fraud_count += 1;
            generator.generate_fraud()
        } else {
            generator.generate_legitimate()
        };
        writer.serialize(&transaction)?;

        if (i + 1) % 100_000 == 0 {
            info!(written = i + 1, total = count, "Progress");
        }
    }
    writer.flush()?;

    info!(
        written = count,
        legitimate = count - fraud_count,
        fraud = fraud_count,
        "Completed"
    );

    Ok(())
}

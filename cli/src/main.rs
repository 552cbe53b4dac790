//! Scenario-driven harness for the transaction evaluator and matching
//! engine — the CLI surface named in spec §6. There is no wallet, RPC
//! client, or network selector here: every command loads a JSON scenario
//! file into an in-memory chain state and drives one of the two entry
//! points (`evaluate_transaction`, `run_market_round`) against it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

mod config;
mod scenario;

use ledger_common::view::ChainStateView;
use ledger_core::evaluate_transaction;
use ledger_core::matching::run_market_round;
use ledger_state::PendingOverlay;
use scenario::ScenarioFile;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Local harness for the ledger evaluation and matching core", long_about = None)]
#[command(version)]
struct Cli {
    /// Scenario file describing the genesis state and transactions to run.
    scenario: PathBuf,

    /// Chain-parameter config file (toml). Overridden by a `params` block
    /// inside the scenario file itself, if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one transaction from the scenario file and commit it on
    /// success.
    RunTx {
        /// Index into the scenario's `transactions` array.
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Run one matching-engine round for a market and print the trades it
    /// produced.
    RunMarketRound {
        quote: u32,
        base: u32,
        /// Oracle feed price; omit to disable the short/margin-call/
        /// expired-cover streams for this round.
        #[arg(long)]
        feed_price: Option<i64>,
    },

    /// Print the balance of a named owner's plain signature-condition
    /// balance for an asset.
    ShowBalance {
        owner: String,
        asset_id: u32,
        /// Delegate slate the balance votes for, if any (matches the
        /// scenario's own `slate` list for that balance).
        #[arg(long, value_delimiter = ',')]
        slate: Option<Vec<i64>>,
    },

    /// Replay the whole scenario file: every transaction in order, then
    /// every market round, printing a summary as it goes.
    ReplayScenario,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let scenario = ScenarioFile::load(&cli.scenario)?;
    let params = match cli.config.as_deref() {
        Some(path) => config::load_params(Some(path))?,
        None => scenario.params(),
    };
    let mut state = scenario.build_state()?;

    match cli.command {
        Commands::RunTx { index } => {
            let tx = scenario.transaction(index)?;
            let mut overlay = PendingOverlay::new(&mut state);
            match evaluate_transaction(tx, &mut overlay, &params) {
                Ok(result) => {
                    overlay.commit();
                    println!("{}", "transaction accepted".green().bold());
                    for (asset, fee) in result.realised_fee {
                        println!("  asset {asset}: realised fee {fee}");
                    }
                }
                Err(err) => {
                    println!("{} {err}", "transaction rejected:".red().bold());
                }
            }
        }
        Commands::RunMarketRound { quote, base, feed_price } => {
            let now = state.now();
            let any_trade = run_market_round(&mut state, &params, quote, base, now, feed_price)?;
            if any_trade {
                println!("{}", "round produced trades".green().bold());
                for entry in state.market_history(quote, base) {
                    println!(
                        "  t={} open={} high={} low={} close={} volume={}",
                        entry.timestamp, entry.open, entry.high, entry.low, entry.close, entry.volume
                    );
                }
            } else {
                println!("{}", "round produced no trades".yellow());
            }
        }
        Commands::ShowBalance { owner, asset_id, slate } => {
            print_balance(&state, &owner, asset_id, slate);
        }
        Commands::ReplayScenario => {
            println!(
                "{}",
                format!("[{}] replaying scenario", chrono::Local::now().format("%H:%M:%S")).dimmed()
            );
            for index in 0..scenario.transactions.len() {
                let tx = scenario.transaction(index)?;
                let mut overlay = PendingOverlay::new(&mut state);
                match evaluate_transaction(tx, &mut overlay, &params) {
                    Ok(result) => {
                        overlay.commit();
                        println!("{} tx[{index}] accepted, fees={:?}", "ok".green(), result.realised_fee);
                    }
                    Err(err) => {
                        println!("{} tx[{index}] rejected: {err}", "err".red());
                    }
                }
            }
            for round in &scenario.market_rounds {
                let now = state.now();
                let any_trade =
                    run_market_round(&mut state, &params, round.quote, round.base, now, round.feed_price)?;
                println!(
                    "{} market round {}/{}: {}",
                    "->".cyan(),
                    round.quote,
                    round.base,
                    if any_trade { "traded" } else { "no match" }
                );
            }
        }
    }

    Ok(())
}

fn print_balance(state: &ledger_state::InMemoryChainState, owner: &str, asset_id: u32, slate: Option<Vec<i64>>) {
    use ledger_common::records::{Slate, WithdrawCondition, WithdrawConditionWithAsset};

    let condition = WithdrawConditionWithAsset::new(
        WithdrawCondition::Signature { owner: scenario::named_owner(owner) },
        asset_id,
        slate.map(|d| Slate { delegates: d }.id()),
    );
    match state.get_balance_record(condition.balance_id()) {
        Some(record) => println!(
            "{owner} / asset {asset_id}: balance={} deposit_date={} last_update={}",
            record.balance, record.deposit_date, record.last_update
        ),
        None => println!("{}", "no such balance".yellow()),
    }
}

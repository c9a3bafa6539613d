mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::calendar::WeeksArgs;
use commands::cashflow::CashflowArgs;
use commands::engine::SnapshotArgs;
use commands::plan::PlanArgs;
use commands::valuation::ValuationArgs;

/// Weekly cash-flow timeline, valuation and repayment planning
#[derive(Parser)]
#[command(
    name = "fcast",
    version,
    about = "Weekly cash-flow timeline, valuation and repayment planning",
    long_about = "A CLI for the flowcast engine: resolve spreadsheet week headers \
                  into a dated timeline, aggregate weekly cash flows with a running \
                  bank balance, compute date-accurate NPV/IRR and discounted \
                  payback, and synthesize repayment plans under buffer and \
                  balance constraints."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve week headers into a dated week table
    Weeks(WeeksArgs),
    /// Aggregate a cell grid into per-week cash-flow rows
    Cashflow(CashflowArgs),
    /// NPV, IRR and discounted payback over a dated series
    Valuation(ValuationArgs),
    /// Synthesize a repayment plan for a target return
    Plan(PlanArgs),
    /// Run a full engine recompute from a state file
    Snapshot(SnapshotArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Weeks(args) => commands::calendar::run_weeks(args),
        Commands::Cashflow(args) => commands::cashflow::run_cashflow(args),
        Commands::Valuation(args) => commands::valuation::run_valuation(args),
        Commands::Plan(args) => commands::plan::run_plan(args),
        Commands::Snapshot(args) => commands::engine::run_snapshot(args),
        Commands::Version => {
            println!("fcast {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

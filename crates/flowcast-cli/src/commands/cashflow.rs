use clap::Args;
use serde_json::Value;

use flowcast_core::cashflow::{self, AggregateInput};

use crate::input;

/// Arguments for per-week cash-flow aggregation
#[derive(Args)]
pub struct CashflowArgs {
    /// Path to JSON input file with grid, week slots and repayments
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_cashflow(args: CashflowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let aggregate_input: AggregateInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for cashflow aggregation".into());
    };

    let result = cashflow::aggregate(&aggregate_input)?;
    Ok(serde_json::to_value(result)?)
}

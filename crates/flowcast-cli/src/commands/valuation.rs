use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use flowcast_core::time_value::{self, ValuationInput};
use flowcast_core::types::CashFlow;

use crate::input;

/// Arguments for dated NPV / IRR / payback valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ValuationArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cash-flow amounts (comma-separated, first is the negative
    /// investment, e.g. "-120000,15000,15000")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub amounts: Option<Vec<Decimal>>,

    /// Cash-flow dates matching --amounts (comma-separated ISO dates,
    /// e.g. "2025-01-06,2025-03-10,2025-03-17")
    #[arg(long, value_delimiter = ',')]
    pub dates: Option<Vec<String>>,

    /// Annual discount rate (e.g. 0.05 for 5%)
    #[arg(long)]
    pub rate: Option<Decimal>,
}

pub fn run_valuation(args: ValuationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let valuation_input: ValuationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let amounts = args
            .amounts
            .ok_or("--amounts is required (or provide --input)")?;
        let dates = args
            .dates
            .ok_or("--dates is required (or provide --input)")?;
        if amounts.len() != dates.len() {
            return Err(format!(
                "--amounts has {} entries but --dates has {}",
                amounts.len(),
                dates.len()
            )
            .into());
        }

        let mut flows = Vec::with_capacity(amounts.len());
        for (amount, date_text) in amounts.into_iter().zip(dates) {
            let date = NaiveDate::parse_from_str(date_text.trim(), "%Y-%m-%d")
                .map_err(|e| format!("Bad date '{date_text}': {e}"))?;
            flows.push(CashFlow {
                date,
                amount,
                label: None,
            });
        }

        ValuationInput {
            flows,
            discount_rate: args.rate.unwrap_or(dec!(0.05)),
        }
    };

    let result = time_value::value_series(&valuation_input)?;
    Ok(serde_json::to_value(result)?)
}

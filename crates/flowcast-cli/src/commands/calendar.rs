use clap::Args;
use serde_json::Value;

use flowcast_core::calendar::{self, CalendarInput};

use crate::input;

/// Arguments for week-table resolution
#[derive(Args)]
pub struct WeeksArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Week headers (comma-separated, e.g. "1 Jan,8 Jan,W3")
    #[arg(long, value_delimiter = ',')]
    pub headers: Option<Vec<String>>,

    /// Base year for headers without a year and for synthetic dates
    #[arg(long, default_value_t = 2025)]
    pub base_year: i32,
}

pub fn run_weeks(args: WeeksArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let calendar_input: CalendarInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let headers = args
            .headers
            .ok_or("--headers is required (or provide --input)")?;
        CalendarInput {
            headers,
            base_year: args.base_year,
        }
    };

    let result = calendar::resolve_weeks(&calendar_input)?;
    Ok(serde_json::to_value(result)?)
}

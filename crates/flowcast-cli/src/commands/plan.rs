use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use flowcast_core::plan::{self, PlanContext, PlanRequest};

use crate::input;

/// Plan synthesis needs both the request and the projected cash-flow
/// context; they travel together in one JSON document.
#[derive(Deserialize)]
struct PlanDocument {
    request: PlanRequest,
    context: PlanContext,
}

/// Arguments for repayment-plan synthesis
#[derive(Args)]
pub struct PlanArgs {
    /// Path to JSON input file with {"request": ..., "context": ...}
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_plan(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document: PlanDocument = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for plan synthesis".into());
    };

    let result = plan::synthesize(&document.request, &document.context)?;
    Ok(serde_json::to_value(result)?)
}

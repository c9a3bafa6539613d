use clap::Args;
use serde_json::Value;

use flowcast_core::engine::{self, EngineState};

use crate::input;

/// Arguments for a full engine recompute
#[derive(Args)]
pub struct SnapshotArgs {
    /// Path to JSON engine-state file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_snapshot(args: SnapshotArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let state: EngineState = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for a snapshot".into());
    };

    let result = engine::recompute(&state)?;
    Ok(serde_json::to_value(result)?)
}

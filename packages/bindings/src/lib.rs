use napi::Result as NapiResult;
use napi_derive::napi;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[napi]
pub fn resolve_weeks(input_json: String) -> NapiResult<String> {
    let input: flowcast_core::calendar::CalendarInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = flowcast_core::calendar::resolve_weeks(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Cash flow
// ---------------------------------------------------------------------------

#[napi]
pub fn aggregate_cashflow(input_json: String) -> NapiResult<String> {
    let input: flowcast_core::cashflow::AggregateInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = flowcast_core::cashflow::aggregate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[napi]
pub fn value_series(input_json: String) -> NapiResult<String> {
    let input: flowcast_core::time_value::ValuationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = flowcast_core::time_value::value_series(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Plan synthesis
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct PlanDocument {
    request: flowcast_core::plan::PlanRequest,
    context: flowcast_core::plan::PlanContext,
}

#[napi]
pub fn synthesize_plan(input_json: String) -> NapiResult<String> {
    let document: PlanDocument = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = flowcast_core::plan::synthesize(&document.request, &document.context)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Full engine recompute
// ---------------------------------------------------------------------------

#[napi]
pub fn recompute(state_json: String) -> NapiResult<String> {
    let state: flowcast_core::engine::EngineState =
        serde_json::from_str(&state_json).map_err(to_napi_error)?;
    let output = flowcast_core::engine::recompute(&state).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

pub mod synthesize;

pub use synthesize::{
    synthesize, BufferPolicy, PlanContext, PlanLine, PlanRequest, SuggestedPlan,
};

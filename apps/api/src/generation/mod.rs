// Generation core: prompt rendering, model fallback, structured-output validation and repair.
// All backend calls go through llm_client; no direct HTTP calls here.

pub mod handlers;
pub mod orchestrator;
pub mod repair;

pub use orchestrator::{AttemptError, GenerationError, Orchestrator};
pub use repair::{HeuristicRepair, JsonRepair};

//! Generation orchestration core for the resume builder: versioned prompt templates,
//! model fallback, provider selection, and structured-output validation/repair.

pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod generation;
pub mod llm_client;
pub mod prompts;
pub mod routes;
pub mod state;

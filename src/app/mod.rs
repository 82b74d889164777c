mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::ReelcamOrchestrator;
pub use types::{ComponentState, RunMode, ShutdownReason};

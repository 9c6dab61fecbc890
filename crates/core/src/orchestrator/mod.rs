//! Batch orchestrator.
//!
//! The orchestrator runs one batch of items end to end:
//! - **Profile**: reads host resource hints once and sizes both gates
//! - **Side task**: starts the ranking over the whole batch (batches of more
//!   than one item), sharing the backend gate with the item pipelines
//! - **Items**: drives every item's pipeline through the bounded mapper
//!   under the outer item gate, publishing progress as items finish
//! - **Envelope**: joins the side task and returns outcomes in submission
//!   order, with summary, profile and final gate statistics

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::BatchOrchestrator;
pub use types::{
    BatchEnvelope, BatchProgress, BatchRequest, BatchStatus, BatchSummary, GateReport,
    OrchestratorError, RunProfile, SideTaskOutcome, StopHandle,
};

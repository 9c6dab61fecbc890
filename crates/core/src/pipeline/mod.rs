//! Per-item stage pipeline.
//!
//! An [`ItemPipeline`] takes one item through four stages:
//!
//! 1. **Extract**: normalized content from the raw item (no backend call)
//! 2. **PrimaryAnalysis**: one backend call producing scores and the
//!    matched/missing lists
//! 3. **Enrichment**: suggestion and comparison calls launched together and
//!    joined
//! 4. **Assemble**: the final [`ItemRecord`]
//!
//! Every backend call goes through a [`BackendLimiter`], a wrapper around
//! the run's inner gate shared by all items and the ranking side task.
//!
//! # Example
//!
//! ```ignore
//! use docflow_core::{BackendLimiter, Gate, ItemPipeline};
//!
//! let backend = BackendLimiter::new(Gate::new(3, "backend")?)
//!     .with_call_timeout(Some(Duration::from_secs(120)));
//! let pipeline = ItemPipeline::new(extractor, analyzer, backend);
//!
//! match pipeline.run(&item).await {
//!     ItemOutcome::Completed(record) => println!("score {}", record.analysis.overall_score),
//!     ItemOutcome::Failed(failure) => println!("failed at {:?}", failure.stage),
//! }
//! ```

mod limiter;
mod runner;
mod types;

pub use limiter::BackendLimiter;
pub use runner::ItemPipeline;
pub(crate) use runner::elapsed_ms;
pub use types::{ItemFailure, ItemOutcome, ItemRecord, Stage, StageTimings};

//! External collaborator interfaces and the stage error taxonomy.
//!
//! The core treats extraction, analysis and ranking as opaque async
//! operations supplied by the host. This module defines their interfaces,
//! the values they exchange, and the errors they may report.

mod error;
mod traits;
mod types;

pub use error::{ErrorKind, StageError};
pub use traits::{Analyzer, BatchRanker, Extractor};
pub use types::{
    Comparison, Item, NormalizedContent, PrimaryAnalysis, Priority, RankedEntry, RankingResult,
    RequirementStatus, Suggestion,
};

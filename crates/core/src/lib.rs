pub mod config;
pub mod gate;
pub mod mapper;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod profile;
pub mod stage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, BackendConfig,
    Config, ConfigError,
};
pub use gate::{Gate, GateError, GatePermit, GateStatus};
pub use mapper::{bounded_map, bounded_map_observed, MapError};
pub use orchestrator::{
    BatchEnvelope, BatchOrchestrator, BatchProgress, BatchRequest, BatchStatus, BatchSummary,
    GateReport, OrchestratorConfig, OrchestratorError, RunProfile, SideTaskOutcome, StopHandle,
};
pub use pipeline::{
    BackendLimiter, ItemFailure, ItemOutcome, ItemPipeline, ItemRecord, Stage, StageTimings,
};
pub use profile::{
    select_profile, ConcurrencyProfile, ResourceHints, ResourcePolicy, ResourceProbe,
    StaticResources,
};
pub use stage::{
    Analyzer, BatchRanker, Comparison, ErrorKind, Extractor, Item, NormalizedContent,
    PrimaryAnalysis, Priority, RankedEntry, RankingResult, RequirementStatus, StageError,
    Suggestion,
};

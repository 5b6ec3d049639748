#![forbid(unsafe_code)]

//! # benchlens
//!
//! Statistical bias-pattern analytics over a judge's case-outcome history.
//!
//! Given a judge's case records for a date range, benchlens computes
//! recency-weighted outcome metrics across four dimensions (motion behavior,
//! decision timing, party/representation patterns, value brackets), compares
//! them to jurisdiction peer baselines, flags statistically significant
//! deviations, and qualifies everything with a tiered confidence score. A
//! deterministic template engine turns the structured report into
//! plain-language prose.
//!
//! The engine is descriptive, not predictive: it computes weighted
//! statistics and peer deviations with explicit sample-size gating, and it
//! degrades gracefully (never errors) on thin datasets. Data access,
//! authorization, result caching, and rendering beyond JSON/markdown belong
//! to the caller.

pub mod analyzers;
pub mod anomaly;
pub mod baseline;
pub mod cache;
pub mod config;
pub mod confidence;
pub mod narrative;
pub mod report;
pub mod types;
pub mod weights;

pub use baseline::{
    BaselineCalculator, BaselineError, BaselineProfile, JudgeMetricSummary, PeerSummaryProvider,
};
pub use cache::{
    BaselineCache, BaselineCacheKey, CacheError, MemoryBaselineCache, SqliteBaselineCache,
};
pub use config::{AnalyticsConfig, ConfigError, TierBreakpoints};
pub use narrative::NarrativeGenerator;
pub use report::{
    render_report_markdown, validate_report_request, ReportBuilder, ReportError, ReportRequest,
    ReportRunOptions,
};
pub use types::{
    AnalysisMethod, AnomalyFlag, AnomalySeverity, BiasReport, CaseRecord, ConfidenceAssessment,
    ConfidenceTier, DataQuality, Dimension, MetricRow, Narrative, OutcomeClass, PartyType,
    RepresentationType, WeightedCase,
};
pub use weights::{TemporalWeightEngine, WeightedDataset, WeightedStats};

//! Report orchestration.
//!
//! Wires together:
//! - TemporalWeightEngine (decay weighting over the raw case set)
//! - The four per-dimension analyzers, fanned out as parallel tasks
//! - BaselineCalculator (best-effort peer comparison join)
//! - AnomalyDetector and ConfidenceScorer
//!
//! Build flow:
//! 1. Validate the request shape; structural violations are the only
//!    fatal condition.
//! 2. Weigh the dataset. Below the raw-case floor the run degrades to a
//!    headline-only report, which is a valid terminal state, not an error.
//! 3. Run analyzers fan-out/fan-in, join baselines when a calculator is
//!    available, detect anomalies, score confidence, finalize.

use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analyzers::motion::analyze_motions;
use crate::analyzers::party::analyze_parties;
use crate::analyzers::timing::analyze_timing;
use crate::analyzers::value::analyze_values;
use crate::anomaly;
use crate::baseline::BaselineCalculator;
use crate::confidence;
use crate::config::{AnalyticsConfig, ConfigError};
use crate::types::{
    AnalysisMethod, BaselineComparison, BiasReport, CaseRecord, ConfidenceTier, DetailedFindings,
    Dimension, MetricRow, Narrative, ReportMetadata, WeightedCase,
};
use crate::weights::{TemporalWeightEngine, WeightedDataset};

// =============================================================================
// Request and options
// =============================================================================

/// One (judge, date-range) analysis request. The engine does not validate
/// referential integrity of the ids; that belongs to the data collaborator.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReportRequest {
    pub judge_id: String,
    pub jurisdiction: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Optional execution settings for reproducible runs.
#[derive(Debug, Clone, Default)]
pub struct ReportRunOptions {
    /// Reference date for decay weighting and freshness. Defaults to the
    /// request's end date so identical inputs weigh identically.
    pub as_of: Option<NaiveDate>,
    /// Serve baselines from cache only; a miss behaves as an unavailable
    /// baseline instead of triggering a recompute.
    pub baseline_cache_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("report generation cancelled")]
    Cancelled,
    #[error("analyzer worker failed: {0}")]
    Worker(String),
}

/// Pipeline position, tracked for observability. `Finalized` and
/// `Degraded` are the two valid terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Init,
    DatasetLoaded,
    Weighted,
    Analyzed,
    BaselineJoined,
    Scored,
    Finalized,
    Degraded,
}

pub fn validate_report_request(req: &ReportRequest) -> Result<(), ReportError> {
    if req.judge_id.trim().is_empty() {
        return Err(ReportError::InvalidRequest("judge_id must not be empty".into()));
    }
    if req.jurisdiction.trim().is_empty() {
        return Err(ReportError::InvalidRequest(
            "jurisdiction must not be empty".into(),
        ));
    }
    if req.start_date > req.end_date {
        return Err(ReportError::InvalidRequest(format!(
            "start_date {} is after end_date {}",
            req.start_date, req.end_date
        )));
    }
    Ok(())
}

/// Shape-contract check over the upstream records. Per-record data-quality
/// gaps are absorbed downstream; only structural violations fail the run.
fn validate_cases(cases: &[CaseRecord]) -> Result<(), ReportError> {
    for (idx, case) in cases.iter().enumerate() {
        if case.party_types.len() > 2 {
            return Err(ReportError::MalformedInput(format!(
                "case {idx} names {} party types (limit 2)",
                case.party_types.len()
            )));
        }
        for (name, value) in [
            ("case_value", case.case_value),
            ("judgment_amount", case.judgment_amount),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ReportError::MalformedInput(format!(
                        "case {idx} has non-finite {name}"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn is_cancelled(flag: Option<&AtomicBool>) -> bool {
    flag.map(|f| f.load(AtomicOrdering::Relaxed)).unwrap_or(false)
}

// =============================================================================
// Builder
// =============================================================================

pub struct ReportBuilder {
    config: AnalyticsConfig,
    baselines: Option<Arc<BaselineCalculator>>,
}

impl ReportBuilder {
    pub fn new(config: AnalyticsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            baselines: None,
        })
    }

    /// Attach the peer-baseline collaborator. Without one, reports simply
    /// carry no peer comparison.
    pub fn with_baselines(mut self, calculator: Arc<BaselineCalculator>) -> Self {
        self.baselines = Some(calculator);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Build one report. Cancellation is checked between pipeline stages;
    /// a cancelled run discards the private partial report and leaves no
    /// shared state behind.
    pub async fn build(
        &self,
        req: &ReportRequest,
        cases: &[CaseRecord],
        options: &ReportRunOptions,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<BiasReport, ReportError> {
        let mut state = BuilderState::Init;
        debug!(?state, judge_id = %req.judge_id, "starting report build");

        validate_report_request(req)?;
        validate_cases(cases)?;
        state = BuilderState::DatasetLoaded;
        debug!(?state, total_cases = cases.len(), "dataset loaded");

        if is_cancelled(cancel_flag) {
            return Err(ReportError::Cancelled);
        }

        let as_of = options.as_of.unwrap_or(req.end_date);
        let engine = TemporalWeightEngine::new(as_of, self.config.decay_rate);
        let dataset = engine.weigh(cases);
        state = BuilderState::Weighted;
        debug!(
            ?state,
            effective = dataset.effective_case_count,
            undated = dataset.undated_cases,
            "dataset weighted"
        );

        let quality = confidence::assess_quality(
            &dataset.cases,
            req.start_date,
            req.end_date,
            as_of,
            self.config.freshness_window_years,
        );

        if dataset.total_cases < self.config.minimum_raw_cases {
            state = BuilderState::Degraded;
            warn!(
                ?state,
                total_cases = dataset.total_cases,
                floor = self.config.minimum_raw_cases,
                "dataset under the analysis floor; producing a degraded report"
            );
            return Ok(self.build_degraded(req, as_of, &dataset, quality));
        }

        if is_cancelled(cancel_flag) {
            return Err(ReportError::Cancelled);
        }

        // The four analyzers are mutually independent: shared read-only
        // input, fan-out/fan-in, no ordering between them.
        let shared: Arc<Vec<WeightedCase>> = Arc::new(dataset.cases.clone());
        let (motion, timing, party, value) = {
            let (c1, f1) = (shared.clone(), self.config.clone());
            let (c2, f2) = (shared.clone(), self.config.clone());
            let (c3, f3) = (shared.clone(), self.config.clone());
            let (c4, f4) = (shared.clone(), self.config.clone());
            tokio::try_join!(
                tokio::task::spawn_blocking(move || analyze_motions(&c1, &f1)),
                tokio::task::spawn_blocking(move || analyze_timing(&c2, &f2)),
                tokio::task::spawn_blocking(move || analyze_parties(&c3, &f3)),
                tokio::task::spawn_blocking(move || analyze_values(&c4, &f4)),
            )
            .map_err(|e| ReportError::Worker(e.to_string()))?
        };
        state = BuilderState::Analyzed;
        debug!(?state, "analyzers complete");

        if is_cancelled(cancel_flag) {
            return Err(ReportError::Cancelled);
        }

        let mut rows: Vec<MetricRow> = Vec::new();
        rows.extend(motion.metric_rows(&self.config));
        rows.extend(timing.metric_rows(&self.config));
        rows.extend(party.metric_rows(&self.config));
        rows.extend(value.metric_rows(&self.config));

        let mut timing = timing;
        let mut methodology_notes = self.base_methodology_notes(as_of, &dataset);
        let mut flags = Vec::new();
        let mut baseline_comparison = None;

        if let Some(calculator) = &self.baselines {
            let keys: Vec<(Dimension, String)> = rows
                .iter()
                .map(|r| (r.dimension, r.label.clone()))
                .collect();
            match calculator
                .profiles(&req.jurisdiction, &keys, options.baseline_cache_only)
                .await
            {
                Ok(profiles) if !profiles.is_empty() => {
                    flags = anomaly::detect(&mut rows, &profiles, &self.config);
                    confirm_timing_outliers(&mut timing, &rows, &self.config);
                    baseline_comparison = Some(BaselineComparison {
                        jurisdiction: req.jurisdiction.clone(),
                        rows_compared: rows
                            .iter()
                            .filter(|r| r.baseline_value.is_some())
                            .count(),
                        profiles_used: profiles.len(),
                        peer_judge_floor: calculator.minimum_peer_judges(),
                    });
                    state = BuilderState::BaselineJoined;
                    debug!(?state, profiles = profiles.len(), "baselines joined");
                }
                Ok(_) => {
                    let reason = if options.baseline_cache_only {
                        "baseline cache held no profiles for this jurisdiction"
                    } else {
                        "peer-judge floor not met"
                    };
                    methodology_notes.push(format!(
                        "no peer baseline was available for this jurisdiction \
                         ({reason}); deviation analysis omitted"
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "baseline lookup unavailable; continuing without peer comparison");
                    methodology_notes.push(format!(
                        "peer baseline lookup was unavailable ({e}); deviation analysis omitted"
                    ));
                }
            }
        } else {
            methodology_notes.push(
                "report generated without a baseline calculator; deviation analysis omitted"
                    .to_string(),
            );
        }

        if is_cancelled(cancel_flag) {
            return Err(ReportError::Cancelled);
        }

        // Raw counts below the Tier3 breakpoint never escape Limited; the
        // breakpoint table only governs datasets above it.
        let force_limited = (dataset.total_cases as f64) < self.config.tier_breakpoints.tier3;
        let assessment = confidence::assess(
            dataset.effective_case_count,
            &self.config.tier_breakpoints,
            &quality,
            force_limited,
        );
        if force_limited {
            methodology_notes.push(format!(
                "confidence held at Limited: {} raw cases sits under the {} needed for tier scoring",
                dataset.total_cases, self.config.tier_breakpoints.tier3
            ));
        }
        state = BuilderState::Scored;
        debug!(?state, tier = assessment.tier.label(), "confidence scored");

        let findings = DetailedFindings {
            motion_analysis: Some(motion),
            timing_analysis: Some(timing),
            party_analysis: Some(party),
            value_analysis: Some(value),
            baseline_comparison,
        };

        let executive_summary = executive_summary(req, &dataset, assessment.tier, flags.len());
        let report = BiasReport {
            metadata: ReportMetadata {
                report_id: Uuid::new_v4(),
                judge_id: req.judge_id.clone(),
                jurisdiction: req.jurisdiction.clone(),
                start_date: req.start_date,
                end_date: req.end_date,
                as_of,
                total_cases: dataset.total_cases,
                effective_cases: dataset.effective_case_count,
                analysis_method: AnalysisMethod::Comprehensive,
                generated_at: Utc::now(),
                warning: None,
            },
            confidence: assessment,
            data_quality: quality,
            metrics_table: rows,
            flagged_anomalies: flags,
            detailed_findings: findings,
            executive_summary,
            methodology_notes,
            meets_minimum_threshold: true,
        };
        state = BuilderState::Finalized;
        debug!(?state, report_id = %report.metadata.report_id, "report finalized");
        Ok(report)
    }

    /// Build the report and its narrative in one call.
    pub async fn build_with_narrative(
        &self,
        req: &ReportRequest,
        cases: &[CaseRecord],
        options: &ReportRunOptions,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<(BiasReport, Narrative), ReportError> {
        let report = self.build(req, cases, options, cancel_flag).await?;
        let narrative = crate::narrative::generate(&report);
        Ok((report, narrative))
    }

    /// Headline-only report for datasets under the raw-case floor. The
    /// fine-grained analyzers are skipped outright rather than run and
    /// hidden.
    fn build_degraded(
        &self,
        req: &ReportRequest,
        as_of: NaiveDate,
        dataset: &WeightedDataset,
        quality: crate::types::DataQuality,
    ) -> BiasReport {
        let assessment = confidence::assess(
            dataset.effective_case_count,
            &self.config.tier_breakpoints,
            &quality,
            true,
        );

        let mut methodology_notes = self.base_methodology_notes(as_of, dataset);
        methodology_notes.push(format!(
            "dataset of {} cases sits under the {}-case analysis floor; \
             only headline metrics are reported",
            dataset.total_cases, self.config.minimum_raw_cases
        ));

        let warning = format!(
            "only {} cases were available for this judge and period; {} are required \
             for a comprehensive analysis. Findings are directional only.",
            dataset.total_cases, self.config.minimum_raw_cases
        );

        let executive_summary = executive_summary(req, dataset, assessment.tier, 0);
        BiasReport {
            metadata: ReportMetadata {
                report_id: Uuid::new_v4(),
                judge_id: req.judge_id.clone(),
                jurisdiction: req.jurisdiction.clone(),
                start_date: req.start_date,
                end_date: req.end_date,
                as_of,
                total_cases: dataset.total_cases,
                effective_cases: dataset.effective_case_count,
                analysis_method: AnalysisMethod::Limited,
                generated_at: Utc::now(),
                warning: Some(warning),
            },
            confidence: assessment,
            data_quality: quality,
            metrics_table: headline_rows(dataset),
            flagged_anomalies: Vec::new(),
            detailed_findings: DetailedFindings::default(),
            executive_summary,
            methodology_notes,
            meets_minimum_threshold: false,
        }
    }

    fn base_methodology_notes(&self, as_of: NaiveDate, dataset: &WeightedDataset) -> Vec<String> {
        let mut notes = vec![
            format!(
                "case contributions decay at {} per year of age relative to {}; \
                 all rates are computed over decayed weights, never raw counts",
                self.config.decay_rate, as_of
            ),
            format!(
                "the confidence percentage blends temporal spread ({:.0}%), case-type \
                 diversity ({:.0}%), and decision freshness ({:.0}%) within the tier band",
                confidence::QUALITY_WEIGHT_TEMPORAL * 100.0,
                confidence::QUALITY_WEIGHT_DIVERSITY * 100.0,
                confidence::QUALITY_WEIGHT_FRESHNESS * 100.0,
            ),
        ];
        if dataset.undated_cases > 0 {
            notes.push(format!(
                "{} cases carried no usable date and were excluded from weighted \
                 aggregates (still counted in the raw total)",
                dataset.undated_cases
            ));
        }
        notes
    }
}

/// Low-granularity metrics safe to report on any dataset size.
fn headline_rows(dataset: &WeightedDataset) -> Vec<MetricRow> {
    let mut grant_weight = 0.0;
    let mut motion_weight = 0.0;
    let mut settled_weight = 0.0;
    let mut total_weight = 0.0;
    let mut motion_raw = 0usize;

    for case in &dataset.cases {
        total_weight += case.weight;
        let class = case.record.outcome_class();
        if class.map(|c| c.is_settlement()).unwrap_or(false) {
            settled_weight += case.weight;
        }
        if case.record.motion_type.is_some() {
            motion_raw += 1;
            motion_weight += case.weight;
            if class.map(|c| c.is_grant()).unwrap_or(false) {
                grant_weight += case.weight;
            }
        }
    }

    let mut rows = Vec::new();
    if motion_weight > 0.0 {
        rows.push(MetricRow {
            dimension: Dimension::Motion,
            label: "motion/overall/grant_rate".to_string(),
            value: grant_weight / motion_weight,
            sample_size: motion_raw,
            effective_sample_size: motion_weight,
            confidence: 0.0,
            baseline_value: None,
            deviation_sigma: None,
            flagged: false,
        });
    }
    if total_weight > 0.0 {
        rows.push(MetricRow {
            dimension: Dimension::Value,
            label: "value/overall/settlement_rate".to_string(),
            value: settled_weight / total_weight,
            sample_size: dataset.cases.len(),
            effective_sample_size: total_weight,
            confidence: 0.0,
            baseline_value: None,
            deviation_sigma: None,
            flagged: false,
        });
    }
    rows
}

/// Mark timing tiers whose 90th-percentile deviation cleared the sigma
/// threshold, confirming their outlier candidates as significant.
fn confirm_timing_outliers(
    timing: &mut crate::analyzers::timing::TimingFindings,
    rows: &[MetricRow],
    config: &AnalyticsConfig,
) {
    for stat in &mut timing.tiers {
        let label = format!("timing/{}/p90_days", stat.tier.as_str());
        let significant = rows.iter().any(|r| {
            r.label == label
                && r.deviation_sigma
                    .map(|s| s.abs() >= config.anomaly_sigma_threshold)
                    .unwrap_or(false)
        });
        stat.baseline_significant = significant;
    }
}

fn executive_summary(
    req: &ReportRequest,
    dataset: &WeightedDataset,
    tier: ConfidenceTier,
    flag_count: usize,
) -> String {
    let anomaly_clause = match flag_count {
        0 => "no statistically significant deviations from peer baselines".to_string(),
        1 => "1 statistically significant deviation from peer baselines".to_string(),
        n => format!("{n} statistically significant deviations from peer baselines"),
    };
    format!(
        "Analysis of judge {} ({}) over {} to {}: {} cases ({:.0} effective after \
         recency weighting), {} confidence, {}.",
        req.judge_id,
        req.jurisdiction,
        req.start_date,
        req.end_date,
        dataset.total_cases,
        dataset.effective_case_count,
        tier.label(),
        anomaly_clause,
    )
}

// =============================================================================
// Markdown rendering
// =============================================================================

/// Human-readable rendering of a finished report. JSON stays the machine
/// surface; this is for operators and exports.
pub fn render_report_markdown(report: &BiasReport, narrative: Option<&Narrative>) -> String {
    let mut out = String::new();
    out.push_str("# Bias Pattern Report\n\n");
    out.push_str(&format!("- Judge: {}\n", report.metadata.judge_id));
    out.push_str(&format!("- Jurisdiction: {}\n", report.metadata.jurisdiction));
    out.push_str(&format!(
        "- Period: {} to {}\n",
        report.metadata.start_date, report.metadata.end_date
    ));
    out.push_str(&format!(
        "- Cases: {} raw / {:.1} effective\n",
        report.metadata.total_cases, report.metadata.effective_cases
    ));
    out.push_str(&format!(
        "- Confidence: {} ({:.1}%)\n",
        report.confidence.tier.label(),
        report.confidence.percentage
    ));
    if let Some(warning) = &report.metadata.warning {
        out.push_str(&format!("- Warning: {warning}\n"));
    }

    out.push_str("\n## Summary\n\n");
    out.push_str(&report.executive_summary);
    out.push('\n');

    if !report.flagged_anomalies.is_empty() {
        out.push_str("\n## Flagged Deviations\n\n");
        for flag in &report.flagged_anomalies {
            out.push_str(&format!(
                "- [{}] {} ({:+.2} sigma, p = {:.4})\n",
                flag.severity.as_str(),
                flag.metric_ref,
                flag.deviation_sigma,
                flag.p_value
            ));
        }
    }

    out.push_str("\n## Metrics\n\n");
    out.push_str("| metric | value | n | effective n | baseline | sigma |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for row in &report.metrics_table {
        let baseline = row
            .baseline_value
            .map(|b| format!("{b:.3}"))
            .unwrap_or_else(|| "-".to_string());
        let sigma = row
            .deviation_sigma
            .map(|s| format!("{s:+.2}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {:.3} | {} | {:.1} | {} | {} |\n",
            row.label, row.value, row.sample_size, row.effective_sample_size, baseline, sigma
        ));
    }

    if !report.methodology_notes.is_empty() {
        out.push_str("\n## Methodology\n\n");
        for note in &report.methodology_notes {
            out.push_str(&format!("- {note}\n"));
        }
    }

    if let Some(narrative) = narrative {
        out.push_str("\n## Narrative\n\n");
        for (title, body) in [
            ("Overview", &narrative.overview),
            ("Key Patterns", &narrative.key_patterns),
            ("Strengths", &narrative.strengths),
            ("Concerns", &narrative.concerns),
            ("Context", &narrative.context_notes),
            ("Recommendations", &narrative.recommendations),
        ] {
            out.push_str(&format!("### {title}\n\n{body}\n\n"));
        }
    }

    out
}

//! Deterministic narrative generation.
//!
//! A fixed rule table maps (confidence tier, anomaly severities present,
//! metric direction) onto canned phrase templates. No randomness, no model
//! calls: identical reports always produce byte-identical narratives, which
//! is what makes narrative output cacheable and unit-testable.

use crate::types::{
    AnalysisMethod, AnomalyFlag, AnomalySeverity, BiasReport, ConfidenceTier, Narrative,
};

/// Quality sub-score at or above this reads as a strength.
const STRENGTH_FLOOR: f64 = 0.75;

pub struct NarrativeGenerator;

impl NarrativeGenerator {
    pub fn generate(report: &BiasReport) -> Narrative {
        generate(report)
    }
}

pub fn generate(report: &BiasReport) -> Narrative {
    let has_high = report
        .flagged_anomalies
        .iter()
        .any(|f| f.severity == AnomalySeverity::High);
    let has_moderate = report
        .flagged_anomalies
        .iter()
        .any(|f| f.severity == AnomalySeverity::Moderate);

    Narrative {
        overview: overview(report),
        key_patterns: key_patterns(report),
        strengths: strengths(report),
        concerns: concerns(report, has_high, has_moderate),
        context_notes: context_notes(report),
        recommendations: recommendations(report.confidence.tier, has_high, has_moderate),
    }
}

fn tier_phrase(tier: ConfidenceTier) -> &'static str {
    match tier {
        ConfidenceTier::Tier1 => {
            "The underlying dataset is large enough to support firm statistical conclusions."
        }
        ConfidenceTier::Tier2 => {
            "The underlying dataset supports solid statistical conclusions with minor caveats."
        }
        ConfidenceTier::Tier3 => {
            "The underlying dataset supports directional conclusions that should be read with care."
        }
        ConfidenceTier::Limited => {
            "The underlying dataset is small; figures describe the record but do not support strong conclusions."
        }
    }
}

fn overview(report: &BiasReport) -> String {
    let method = match report.metadata.analysis_method {
        AnalysisMethod::Comprehensive => "a comprehensive pattern analysis",
        AnalysisMethod::Limited => "a limited, headline-only analysis",
    };
    format!(
        "This report presents {} of judge {} in {} covering {} to {}. It draws on {} cases, \
         weighted by recency to an effective sample of {:.0}. Confidence is {} at {:.0}%. {}",
        method,
        report.metadata.judge_id,
        report.metadata.jurisdiction,
        report.metadata.start_date,
        report.metadata.end_date,
        report.metadata.total_cases,
        report.metadata.effective_cases,
        report.confidence.tier.label(),
        report.confidence.percentage,
        tier_phrase(report.confidence.tier),
    )
}

fn direction_phrase(flag: &AnomalyFlag) -> &'static str {
    if flag.deviation_sigma > 0.0 {
        "runs above"
    } else {
        "runs below"
    }
}

fn severity_phrase(severity: AnomalySeverity) -> &'static str {
    match severity {
        AnomalySeverity::Moderate => "a moderate deviation",
        AnomalySeverity::High => "a pronounced deviation",
    }
}

fn key_patterns(report: &BiasReport) -> String {
    if report.flagged_anomalies.is_empty() {
        return match report.metadata.analysis_method {
            AnalysisMethod::Comprehensive => {
                "No metric deviated from its jurisdiction peer baseline by a statistically \
                 significant margin."
                    .to_string()
            }
            AnalysisMethod::Limited => {
                "Peer comparison was not performed; the dataset is below the comprehensive \
                 analysis floor."
                    .to_string()
            }
        };
    }

    // Flags arrive pre-sorted most severe first; render in that order.
    let mut lines = Vec::with_capacity(report.flagged_anomalies.len());
    for flag in &report.flagged_anomalies {
        lines.push(format!(
            "The {} metric {} {} its peer baseline by {:.1} standard deviations, {}.",
            flag.dimension,
            flag.metric_ref,
            direction_phrase(flag),
            flag.deviation_sigma.abs(),
            severity_phrase(flag.severity),
        ));
    }
    lines.join(" ")
}

fn strengths(report: &BiasReport) -> String {
    let quality = &report.data_quality;
    let mut lines = Vec::new();
    if quality.temporal_distribution >= STRENGTH_FLOOR {
        lines.push("Cases are well distributed across the analysis period.");
    }
    if quality.category_diversity >= STRENGTH_FLOOR {
        lines.push("The caseload spans a diverse set of case types.");
    }
    if quality.data_freshness >= STRENGTH_FLOOR {
        lines.push("Most of the weighted record is recent.");
    }
    if matches!(
        report.confidence.tier,
        ConfidenceTier::Tier1 | ConfidenceTier::Tier2
    ) {
        lines.push("The effective sample size is large.");
    }
    if lines.is_empty() {
        return "No particular data-quality strengths stand out for this dataset.".to_string();
    }
    lines.join(" ")
}

fn concerns(report: &BiasReport, has_high: bool, has_moderate: bool) -> String {
    let mut lines = Vec::new();
    if has_high {
        lines.push(
            "At least one metric shows a pronounced deviation from peers and warrants closer \
             review of the underlying cases."
                .to_string(),
        );
    }
    if has_moderate {
        lines.push(
            "Moderate deviations from peer norms are present and worth monitoring.".to_string(),
        );
    }
    if report.confidence.tier == ConfidenceTier::Limited {
        lines.push(
            "The limited effective sample size means individual figures can move substantially \
             as new cases arrive."
                .to_string(),
        );
    }
    if let Some(warning) = &report.metadata.warning {
        lines.push(warning.clone());
    }
    if lines.is_empty() {
        return "No significant concerns were identified at the current confidence level."
            .to_string();
    }
    lines.join(" ")
}

fn context_notes(report: &BiasReport) -> String {
    let mut lines = vec![
        "Figures are recency-weighted: recent rulings count more than older ones.".to_string(),
    ];
    if report.detailed_findings.baseline_comparison.is_some() {
        lines.push(
            "Deviations are measured against aggregate peer behavior in the same jurisdiction."
                .to_string(),
        );
    } else {
        lines.push(
            "No peer baseline was available, so no deviation claims are made.".to_string(),
        );
    }
    lines.push(
        "All findings are descriptive statistics about outcomes; they do not assess the legal \
         correctness of any ruling and support no causal conclusions."
            .to_string(),
    );
    lines.join(" ")
}

fn recommendations(tier: ConfidenceTier, has_high: bool, has_moderate: bool) -> String {
    match (tier, has_high, has_moderate) {
        (ConfidenceTier::Limited, _, _) => {
            "Treat this report as a preliminary sketch. Re-run the analysis once more of the \
             judge's record becomes available."
                .to_string()
        }
        (_, true, _) => {
            "Review the flagged metrics case-by-case before drawing conclusions; pronounced \
             deviations can reflect docket composition as well as judicial behavior."
                .to_string()
        }
        (_, false, true) => {
            "Monitor the moderately deviating metrics in future reporting periods to see \
             whether the pattern persists."
                .to_string()
        }
        (_, false, false) => {
            "No follow-up is indicated by the current data; routine periodic re-analysis is \
             sufficient."
                .to_string()
        }
    }
}

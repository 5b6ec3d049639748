//! Core data model: case records at the input boundary, metric rows and
//! report/narrative shapes at the output boundary.
//!
//! Everything here is pure data. Reports serialize to JSON and carry no
//! behavior; a fresh request always produces a fresh report object.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analyzers::motion::MotionFindings;
use crate::analyzers::party::PartyFindings;
use crate::analyzers::timing::TimingFindings;
use crate::analyzers::value::ValueFindings;

// =============================================================================
// Input records
// =============================================================================

/// Category of litigant attached to a case. A case names at most two.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Individual,
    Corporation,
    SmallBusiness,
    Government,
    NonProfit,
    Insurance,
    Unknown,
}

impl PartyType {
    pub const ALL: [PartyType; 7] = [
        PartyType::Individual,
        PartyType::Corporation,
        PartyType::SmallBusiness,
        PartyType::Government,
        PartyType::NonProfit,
        PartyType::Insurance,
        PartyType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartyType::Individual => "individual",
            PartyType::Corporation => "corporation",
            PartyType::SmallBusiness => "small_business",
            PartyType::Government => "government",
            PartyType::NonProfit => "non_profit",
            PartyType::Insurance => "insurance",
            PartyType::Unknown => "unknown",
        }
    }
}

/// How the tracked party was represented.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationType {
    ProSe,
    PrivateCounsel,
    PublicDefender,
}

impl RepresentationType {
    pub const ALL: [RepresentationType; 3] = [
        RepresentationType::ProSe,
        RepresentationType::PrivateCounsel,
        RepresentationType::PublicDefender,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepresentationType::ProSe => "pro_se",
            RepresentationType::PrivateCounsel => "private_counsel",
            RepresentationType::PublicDefender => "public_defender",
        }
    }
}

/// One litigated matter assigned to a judge, as returned by the upstream
/// case-data collaborator. Every analytic field may be null per-record;
/// missing fields exclude the record from the affected computation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Broad matter category (e.g. "contract", "tort").
    #[serde(default)]
    pub case_type: Option<String>,
    /// Final ruling text. Preferred over `status` when both are present.
    #[serde(default)]
    pub outcome: Option<String>,
    /// Docket status, used as an outcome fallback.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub filing_date: Option<NaiveDate>,
    #[serde(default)]
    pub decision_date: Option<NaiveDate>,
    /// Claimed amount in controversy, dollars.
    #[serde(default)]
    pub case_value: Option<f64>,
    /// Awarded amount, dollars. Drives judgment-to-claim ratios.
    #[serde(default)]
    pub judgment_amount: Option<f64>,
    #[serde(default)]
    pub motion_type: Option<String>,
    /// Up to two party categories.
    #[serde(default)]
    pub party_types: Vec<PartyType>,
    #[serde(default)]
    pub representation_type: Option<RepresentationType>,
}

impl CaseRecord {
    /// Outcome text with the documented preference order: `outcome`, then
    /// `status` as a fallback.
    pub fn effective_outcome(&self) -> Option<&str> {
        self.outcome.as_deref().or(self.status.as_deref())
    }

    pub fn outcome_class(&self) -> Option<OutcomeClass> {
        self.effective_outcome().map(OutcomeClass::classify)
    }

    /// Days from filing to decision, when both dates exist and are ordered.
    pub fn decision_days(&self) -> Option<f64> {
        let filed = self.filing_date?;
        let decided = self.decision_date?;
        let days = decided.signed_duration_since(filed).num_days();
        if days < 0 {
            return None;
        }
        Some(days as f64)
    }
}

/// Closed taxonomy over free-text outcome strings. Unrecognized outcomes
/// classify as `Other` and count toward totals but toward no rate numerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Granted,
    Denied,
    Settlement,
    PlaintiffVerdict,
    DefenseVerdict,
    Dismissed,
    Withdrawn,
    Other,
}

impl OutcomeClass {
    pub fn classify(raw: &str) -> OutcomeClass {
        let s = raw.to_ascii_lowercase();
        if s.contains("settl") || s.contains("consent") {
            OutcomeClass::Settlement
        } else if s.contains("withdraw") {
            OutcomeClass::Withdrawn
        } else if s.contains("grant") {
            OutcomeClass::Granted
        } else if s.contains("denied") || s.contains("deny") || s.contains("overrul") {
            OutcomeClass::Denied
        } else if s.contains("dismiss") {
            OutcomeClass::Dismissed
        } else if s.contains("plaintiff") {
            OutcomeClass::PlaintiffVerdict
        } else if s.contains("defendant") || s.contains("defense") {
            OutcomeClass::DefenseVerdict
        } else {
            OutcomeClass::Other
        }
    }

    /// Whether a motion with this outcome was granted. Only meaningful for
    /// motion grant rates.
    pub fn is_grant(&self) -> bool {
        matches!(self, OutcomeClass::Granted)
    }

    /// Whether the outcome favored the claiming side. `None` when the
    /// outcome carries no win/loss direction (settlement, withdrawal,
    /// unrecognized).
    pub fn favorable(&self) -> Option<bool> {
        match self {
            OutcomeClass::Granted | OutcomeClass::PlaintiffVerdict => Some(true),
            OutcomeClass::Denied | OutcomeClass::DefenseVerdict | OutcomeClass::Dismissed => {
                Some(false)
            }
            OutcomeClass::Settlement | OutcomeClass::Withdrawn | OutcomeClass::Other => None,
        }
    }

    pub fn is_settlement(&self) -> bool {
        matches!(self, OutcomeClass::Settlement)
    }
}

/// A case record plus its temporal decay weight. Derived per run, never
/// stored independently.
#[derive(Debug, Clone)]
pub struct WeightedCase {
    pub record: CaseRecord,
    /// Decay weight in (0, 1].
    pub weight: f64,
}

// =============================================================================
// Metric rows and anomaly flags
// =============================================================================

/// Reporting dimension a metric belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Motion,
    Timing,
    Party,
    Value,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Motion => "motion",
            Dimension::Timing => "timing",
            Dimension::Party => "party",
            Dimension::Value => "value",
        }
    }

    pub fn parse(s: &str) -> Option<Dimension> {
        match s {
            "motion" => Some(Dimension::Motion),
            "timing" => Some(Dimension::Timing),
            "party" => Some(Dimension::Party),
            "value" => Some(Dimension::Value),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reportable statistic. `label` doubles as the metric key used to look
/// up the peer baseline for the same statistic.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub dimension: Dimension,
    pub label: String,
    pub value: f64,
    /// Raw contributing case count.
    pub sample_size: usize,
    /// Weighted contributing case count.
    pub effective_sample_size: f64,
    /// Dimension-local confidence, 0-100. Independent of the report tier.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_sigma: Option<f64>,
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Moderate,
    High,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Moderate => "moderate",
            AnomalySeverity::High => "high",
        }
    }
}

/// A statistically significant deviation from the peer baseline.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyFlag {
    pub dimension: Dimension,
    /// Label of the metric row the flag refers to.
    pub metric_ref: String,
    pub deviation_sigma: f64,
    pub severity: AnomalySeverity,
    /// Gaussian two-sided tail probability for the observed deviation.
    pub p_value: f64,
    pub description: String,
}

// =============================================================================
// Confidence
// =============================================================================

/// Discrete reliability classification. A pure function of effective case
/// count; data-quality sub-scores move only the in-band percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Tier1,
    Tier2,
    Tier3,
    Limited,
}

impl ConfidenceTier {
    /// Percentage band the quality score interpolates across.
    pub fn band(&self) -> (f64, f64) {
        match self {
            ConfidenceTier::Tier1 => (90.0, 95.0),
            ConfidenceTier::Tier2 => (80.0, 89.0),
            ConfidenceTier::Tier3 => (70.0, 79.0),
            ConfidenceTier::Limited => (50.0, 69.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::Tier1 => "Tier 1",
            ConfidenceTier::Tier2 => "Tier 2",
            ConfidenceTier::Tier3 => "Tier 3",
            ConfidenceTier::Limited => "Limited",
        }
    }
}

/// Quality sub-scores feeding the in-band percentage. All in [0, 1].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DataQuality {
    /// Fraction of months in the report range containing at least one case.
    pub temporal_distribution: f64,
    /// Distinct case types relative to the diversity target.
    pub category_diversity: f64,
    /// Weighted fraction of cases decided within the freshness window.
    pub data_freshness: f64,
    /// Fixed-weight blend of the three sub-scores.
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfidenceAssessment {
    pub tier: ConfidenceTier,
    /// Percentage within the tier band, interpolated from `DataQuality::overall`.
    pub percentage: f64,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    Comprehensive,
    Limited,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub report_id: Uuid,
    pub judge_id: String,
    pub jurisdiction: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Reference date for decay weighting and freshness.
    pub as_of: NaiveDate,
    pub total_cases: usize,
    pub effective_cases: f64,
    pub analysis_method: AnalysisMethod,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Summary of the peer-baseline join, present only when at least one
/// profile was available.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineComparison {
    pub jurisdiction: String,
    /// Metric rows that had a usable peer profile.
    pub rows_compared: usize,
    pub profiles_used: usize,
    pub peer_judge_floor: usize,
}

/// Per-analyzer output sections. A section is absent when its analyzer was
/// skipped or its collaborator was unavailable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailedFindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_analysis: Option<MotionFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_analysis: Option<TimingFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_analysis: Option<PartyFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_analysis: Option<ValueFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_comparison: Option<BaselineComparison>,
}

/// Aggregate root for one (judge, date-range) analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct BiasReport {
    pub metadata: ReportMetadata,
    pub confidence: ConfidenceAssessment,
    pub data_quality: DataQuality,
    pub metrics_table: Vec<MetricRow>,
    pub flagged_anomalies: Vec<AnomalyFlag>,
    pub detailed_findings: DetailedFindings,
    pub executive_summary: String,
    pub methodology_notes: Vec<String>,
    pub meets_minimum_threshold: bool,
}

/// Plain-language rendering of a report. Produced deterministically;
/// identical reports yield byte-identical narratives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub overview: String,
    pub key_patterns: String,
    pub strengths: String,
    pub concerns: String,
    pub context_notes: String,
    pub recommendations: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_preference_order_uses_status_as_fallback() {
        let case = CaseRecord {
            outcome: Some("granted".into()),
            status: Some("dismissed".into()),
            ..Default::default()
        };
        assert_eq!(case.effective_outcome(), Some("granted"));

        let fallback = CaseRecord {
            status: Some("dismissed".into()),
            ..Default::default()
        };
        assert_eq!(fallback.effective_outcome(), Some("dismissed"));
        assert_eq!(fallback.outcome_class(), Some(OutcomeClass::Dismissed));
    }

    #[test]
    fn outcome_taxonomy_classifies_common_phrasings() {
        assert_eq!(
            OutcomeClass::classify("Motion GRANTED in part"),
            OutcomeClass::Granted
        );
        assert_eq!(OutcomeClass::classify("denied"), OutcomeClass::Denied);
        assert_eq!(
            OutcomeClass::classify("settled before trial"),
            OutcomeClass::Settlement
        );
        assert_eq!(
            OutcomeClass::classify("judgment for plaintiff"),
            OutcomeClass::PlaintiffVerdict
        );
        assert_eq!(OutcomeClass::classify("sealed"), OutcomeClass::Other);
    }

    #[test]
    fn decision_days_requires_ordered_dates() {
        let case = CaseRecord {
            filing_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            decision_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert_eq!(case.decision_days(), Some(61.0));

        let inverted = CaseRecord {
            filing_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            decision_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        assert_eq!(inverted.decision_days(), None);
    }

    #[test]
    fn tier_bands_do_not_overlap() {
        let tiers = [
            ConfidenceTier::Limited,
            ConfidenceTier::Tier3,
            ConfidenceTier::Tier2,
            ConfidenceTier::Tier1,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].band().1 < pair[1].band().0);
        }
    }
}

//! Decision-timing analysis: weighted duration percentiles per case-value
//! complexity tier.

use serde::Serialize;
use tracing::debug;

use crate::analyzers::local_confidence;
use crate::config::AnalyticsConfig;
use crate::types::{Dimension, MetricRow, WeightedCase};
use crate::weights::weighted_quantile;

/// Case-value bucket used to normalize timing comparisons. Cases without a
/// value are excluded from this analyzer entirely rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
    HighlyComplex,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [
        ComplexityTier::Simple,
        ComplexityTier::Moderate,
        ComplexityTier::Complex,
        ComplexityTier::HighlyComplex,
    ];

    pub fn from_case_value(value: f64) -> ComplexityTier {
        if value < 50_000.0 {
            ComplexityTier::Simple
        } else if value < 250_000.0 {
            ComplexityTier::Moderate
        } else if value < 1_000_000.0 {
            ComplexityTier::Complex
        } else {
            ComplexityTier::HighlyComplex
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Moderate => "moderate",
            ComplexityTier::Complex => "complex",
            ComplexityTier::HighlyComplex => "highly_complex",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingTierStat {
    pub tier: ComplexityTier,
    /// Date-complete cases contributing durations.
    pub sample_size: usize,
    pub effective_sample_size: f64,
    pub p25_days: f64,
    pub p75_days: f64,
    pub p90_days: f64,
    /// Cases whose duration exceeds the tier's 90th percentile. Candidates
    /// only; promotion to an anomaly requires the tier's peer-baseline
    /// deviation to clear the sigma threshold.
    pub outlier_candidates: usize,
    /// Set after the baseline join when this tier's deviation cleared the
    /// threshold, confirming the candidates as significant.
    pub baseline_significant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingFindings {
    pub tiers: Vec<TimingTierStat>,
    /// Cases skipped for having no case value.
    pub unvalued_cases: usize,
}

pub fn analyze_timing(cases: &[WeightedCase], _config: &AnalyticsConfig) -> TimingFindings {
    let mut samples: [Vec<(f64, f64)>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    let mut unvalued = 0usize;

    for case in cases {
        let Some(value) = case.record.case_value else {
            unvalued += 1;
            continue;
        };
        let Some(days) = case.record.decision_days() else {
            debug!("case missing an ordered filing/decision pair; excluded from timing");
            continue;
        };
        let tier = ComplexityTier::from_case_value(value);
        samples[tier as usize].push((days, case.weight));
    }

    let tiers = ComplexityTier::ALL
        .iter()
        .filter_map(|&tier| {
            let tier_samples = &samples[tier as usize];
            if tier_samples.is_empty() {
                return None;
            }
            let p25 = weighted_quantile(tier_samples, 0.25)?;
            let p75 = weighted_quantile(tier_samples, 0.75)?;
            let p90 = weighted_quantile(tier_samples, 0.90)?;
            let outliers = tier_samples.iter().filter(|(d, _)| *d > p90).count();
            Some(TimingTierStat {
                tier,
                sample_size: tier_samples.len(),
                effective_sample_size: tier_samples.iter().map(|(_, w)| w).sum(),
                p25_days: p25,
                p75_days: p75,
                p90_days: p90,
                outlier_candidates: outliers,
                baseline_significant: false,
            })
        })
        .collect();

    TimingFindings {
        tiers,
        unvalued_cases: unvalued,
    }
}

impl TimingFindings {
    pub fn metric_rows(&self, config: &AnalyticsConfig) -> Vec<MetricRow> {
        let mut rows = Vec::with_capacity(self.tiers.len() * 3);
        for stat in &self.tiers {
            for (suffix, value) in [
                ("p25_days", stat.p25_days),
                ("p75_days", stat.p75_days),
                ("p90_days", stat.p90_days),
            ] {
                rows.push(MetricRow {
                    dimension: Dimension::Timing,
                    label: format!("timing/{}/{}", stat.tier.as_str(), suffix),
                    value,
                    sample_size: stat.sample_size,
                    effective_sample_size: stat.effective_sample_size,
                    confidence: local_confidence(
                        stat.effective_sample_size,
                        config.timing_support_floor,
                    ),
                    baseline_value: None,
                    deviation_sigma: None,
                    flagged: false,
                });
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaseRecord;
    use chrono::NaiveDate;

    fn timed_case(value: Option<f64>, days: i64, weight: f64) -> WeightedCase {
        let filed = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        WeightedCase {
            record: CaseRecord {
                case_value: value,
                filing_date: Some(filed),
                decision_date: Some(filed + chrono::Duration::days(days)),
                ..Default::default()
            },
            weight,
        }
    }

    #[test]
    fn tier_boundaries_match_value_brackets() {
        assert_eq!(
            ComplexityTier::from_case_value(49_999.0),
            ComplexityTier::Simple
        );
        assert_eq!(
            ComplexityTier::from_case_value(50_000.0),
            ComplexityTier::Moderate
        );
        assert_eq!(
            ComplexityTier::from_case_value(999_999.0),
            ComplexityTier::Complex
        );
        assert_eq!(
            ComplexityTier::from_case_value(1_000_000.0),
            ComplexityTier::HighlyComplex
        );
    }

    #[test]
    fn unvalued_cases_are_excluded_entirely() {
        let cases = vec![
            timed_case(Some(10_000.0), 30, 1.0),
            timed_case(None, 400, 1.0),
        ];
        let findings = analyze_timing(&cases, &AnalyticsConfig::default());
        assert_eq!(findings.unvalued_cases, 1);
        assert_eq!(findings.tiers.len(), 1);
        assert_eq!(findings.tiers[0].tier, ComplexityTier::Simple);
        assert_eq!(findings.tiers[0].sample_size, 1);
    }

    #[test]
    fn percentiles_are_ordered_and_outliers_counted() {
        let cases: Vec<WeightedCase> = (1..=100)
            .map(|d| timed_case(Some(10_000.0), d * 3, 1.0))
            .collect();
        let findings = analyze_timing(&cases, &AnalyticsConfig::default());
        let stat = &findings.tiers[0];
        assert!(stat.p25_days <= stat.p75_days);
        assert!(stat.p75_days <= stat.p90_days);
        assert!(stat.outlier_candidates > 0);
        assert!(stat.outlier_candidates <= 12);
        assert!(!stat.baseline_significant);
    }
}

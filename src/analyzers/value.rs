//! Value-bracket analysis: judgment-to-claim ratios and the relationship
//! between case value and settlement within nine claim-size brackets.

use serde::Serialize;

use crate::analyzers::local_confidence;
use crate::config::AnalyticsConfig;
use crate::types::{Dimension, MetricRow, WeightedCase};
use crate::weights::{weighted_correlation, WeightedStats};

/// Claim-size brackets, lower bound inclusive, upper exclusive.
pub const VALUE_BRACKETS: [(&str, f64, f64); 9] = [
    ("under_10k", 0.0, 10_000.0),
    ("10k_25k", 10_000.0, 25_000.0),
    ("25k_50k", 25_000.0, 50_000.0),
    ("50k_100k", 50_000.0, 100_000.0),
    ("100k_250k", 100_000.0, 250_000.0),
    ("250k_1m", 250_000.0, 1_000_000.0),
    ("1m_2_5m", 1_000_000.0, 2_500_000.0),
    ("2_5m_5m", 2_500_000.0, 5_000_000.0),
    ("over_5m", 5_000_000.0, f64::INFINITY),
];

pub fn bracket_for(case_value: f64) -> Option<usize> {
    if case_value < 0.0 {
        return None;
    }
    VALUE_BRACKETS
        .iter()
        .position(|(_, lo, hi)| case_value >= *lo && case_value < *hi)
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueBracketStat {
    pub bracket: &'static str,
    pub sample_size: usize,
    pub effective_sample_size: f64,
    /// Weighted mean of judgment/claim over cases carrying both amounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgment_ratio_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgment_ratio_stddev: Option<f64>,
    /// Weighted share of the bracket's cases that settled.
    pub settlement_rate: f64,
    /// Weighted correlation between case value and settlement occurrence.
    /// Absent for brackets under the correlation support floor; the bracket
    /// is still shown for its counts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_settlement_correlation: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueFindings {
    pub brackets: Vec<ValueBracketStat>,
    /// Cases skipped for having no case value.
    pub unvalued_cases: usize,
}

#[derive(Default)]
struct BracketAccum {
    raw: usize,
    weight: f64,
    settled_weight: f64,
    ratio: WeightedStats,
    correlation_samples: Vec<(f64, f64, f64)>,
}

pub fn analyze_values(cases: &[WeightedCase], config: &AnalyticsConfig) -> ValueFindings {
    let mut accums: Vec<BracketAccum> = (0..VALUE_BRACKETS.len())
        .map(|_| BracketAccum::default())
        .collect();
    let mut unvalued = 0usize;

    for case in cases {
        let Some(value) = case.record.case_value else {
            unvalued += 1;
            continue;
        };
        let Some(idx) = bracket_for(value) else {
            unvalued += 1;
            continue;
        };
        let accum = &mut accums[idx];
        accum.raw += 1;
        accum.weight += case.weight;

        let settled = case
            .record
            .outcome_class()
            .map(|c| c.is_settlement())
            .unwrap_or(false);
        if settled {
            accum.settled_weight += case.weight;
        }
        accum
            .correlation_samples
            .push((value, if settled { 1.0 } else { 0.0 }, case.weight));

        if let Some(judgment) = case.record.judgment_amount {
            if value > 0.0 && judgment >= 0.0 {
                accum.ratio.add(judgment / value, case.weight);
            }
        }
    }

    let brackets = VALUE_BRACKETS
        .iter()
        .enumerate()
        .filter_map(|(idx, (label, _, _))| {
            let accum = &accums[idx];
            if accum.raw == 0 || accum.weight <= 0.0 {
                return None;
            }
            let correlation = if accum.weight >= config.correlation_support_floor {
                weighted_correlation(&accum.correlation_samples)
            } else {
                None
            };
            Some(ValueBracketStat {
                bracket: label,
                sample_size: accum.raw,
                effective_sample_size: accum.weight,
                judgment_ratio_mean: accum.ratio.mean(),
                judgment_ratio_stddev: accum.ratio.stddev(),
                settlement_rate: accum.settled_weight / accum.weight,
                value_settlement_correlation: correlation,
            })
        })
        .collect();

    ValueFindings {
        brackets,
        unvalued_cases: unvalued,
    }
}

impl ValueFindings {
    pub fn metric_rows(&self, config: &AnalyticsConfig) -> Vec<MetricRow> {
        let mut rows = Vec::with_capacity(self.brackets.len() * 3);
        for stat in &self.brackets {
            let confidence =
                local_confidence(stat.effective_sample_size, config.correlation_support_floor);
            rows.push(MetricRow {
                dimension: Dimension::Value,
                label: format!("value/{}/settlement_rate", stat.bracket),
                value: stat.settlement_rate,
                sample_size: stat.sample_size,
                effective_sample_size: stat.effective_sample_size,
                confidence,
                baseline_value: None,
                deviation_sigma: None,
                flagged: false,
            });
            if let Some(mean) = stat.judgment_ratio_mean {
                rows.push(MetricRow {
                    dimension: Dimension::Value,
                    label: format!("value/{}/judgment_ratio", stat.bracket),
                    value: mean,
                    sample_size: stat.sample_size,
                    effective_sample_size: stat.effective_sample_size,
                    confidence,
                    baseline_value: None,
                    deviation_sigma: None,
                    flagged: false,
                });
            }
            if let Some(corr) = stat.value_settlement_correlation {
                rows.push(MetricRow {
                    dimension: Dimension::Value,
                    label: format!("value/{}/value_settlement_corr", stat.bracket),
                    value: corr,
                    sample_size: stat.sample_size,
                    effective_sample_size: stat.effective_sample_size,
                    confidence,
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

    fn valued_case(value: f64, outcome: &str, judgment: Option<f64>) -> WeightedCase {
        WeightedCase {
            record: CaseRecord {
                case_value: Some(value),
                judgment_amount: judgment,
                outcome: Some(outcome.into()),
                ..Default::default()
            },
            weight: 1.0,
        }
    }

    #[test]
    fn bracket_lookup_covers_the_full_range() {
        assert_eq!(bracket_for(0.0), Some(0));
        assert_eq!(bracket_for(9_999.99), Some(0));
        assert_eq!(bracket_for(10_000.0), Some(1));
        assert_eq!(bracket_for(4_999_999.0), Some(7));
        assert_eq!(bracket_for(50_000_000.0), Some(8));
        assert_eq!(bracket_for(-5.0), None);
    }

    #[test]
    fn thin_brackets_keep_counts_but_lose_correlation() {
        // 10 effective cases sits under the default correlation floor of 15.
        let cases: Vec<WeightedCase> = (0..10)
            .map(|i| valued_case(1_000.0 + i as f64 * 500.0, "settled", None))
            .collect();
        let findings = analyze_values(&cases, &AnalyticsConfig::default());
        let stat = &findings.brackets[0];
        assert_eq!(stat.sample_size, 10);
        assert!(stat.value_settlement_correlation.is_none());
        assert!((stat.settlement_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_present_above_floor() {
        // Higher values settle, lower values go to verdict.
        let mut cases: Vec<WeightedCase> = (0..10)
            .map(|i| valued_case(8_000.0 + i as f64 * 100.0, "settled", None))
            .collect();
        cases.extend((0..10).map(|i| {
            valued_case(1_000.0 + i as f64 * 100.0, "judgment for defendant", None)
        }));
        let findings = analyze_values(&cases, &AnalyticsConfig::default());
        let corr = findings.brackets[0].value_settlement_correlation.unwrap();
        assert!(corr > 0.5, "correlation {corr}");
    }

    #[test]
    fn judgment_ratio_requires_both_amounts() {
        let cases = vec![
            valued_case(100_000.0, "judgment for plaintiff", Some(50_000.0)),
            valued_case(100_000.0, "judgment for plaintiff", None),
        ];
        let findings = analyze_values(&cases, &AnalyticsConfig::default());
        let stat = &findings.brackets[0];
        assert!((stat.judgment_ratio_mean.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(stat.sample_size, 2);
    }
}

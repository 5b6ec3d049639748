//! Motion-pattern analysis: weighted grant rates and decision timing per
//! recognized motion category.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::analyzers::local_confidence;
use crate::config::AnalyticsConfig;
use crate::types::{Dimension, MetricRow, WeightedCase};
use crate::weights::WeightedStats;

/// Recognized motion categories with their lowercase match aliases. More
/// specific aliases come first so e.g. "default judgment" never lands in the
/// bare judgment bucket.
static MOTION_CATEGORIES: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("summary_judgment", vec!["summary judgment"]),
        ("default_judgment", vec!["default judgment", "default"]),
        ("judgment_on_pleadings", vec!["judgment on the pleadings", "pleadings"]),
        ("dismiss", vec!["dismiss"]),
        ("compel_discovery", vec!["compel"]),
        ("protective_order", vec!["protective order"]),
        ("preliminary_injunction", vec!["preliminary injunction", "injunction", "restraining order"]),
        ("class_certification", vec!["class certification", "class action"]),
        ("sanctions", vec!["sanction"]),
        ("exclude_evidence", vec!["in limine", "exclude evidence", "suppress"]),
        ("change_of_venue", vec!["venue", "transfer"]),
        ("reconsideration", vec!["reconsider"]),
        ("continuance", vec!["continuance", "postpone"]),
        ("new_trial", vec!["new trial"]),
    ]
});

/// Map a raw motion type onto a recognized category.
pub fn categorize_motion(motion_type: &str) -> Option<&'static str> {
    let normalized = motion_type
        .to_ascii_lowercase()
        .replace(['_', '-'], " ");
    MOTION_CATEGORIES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| normalized.contains(a)))
        .map(|(key, _)| *key)
}

#[derive(Debug, Clone, Serialize)]
pub struct MotionCategoryStat {
    pub category: &'static str,
    pub sample_size: usize,
    pub effective_sample_size: f64,
    /// Weighted share of the category's cases that were granted.
    pub grant_rate: f64,
    /// Weighted mean filing-to-decision days over date-complete cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_decision_days: Option<f64>,
    /// Date-complete cases behind `mean_decision_days`.
    pub timing_sample_size: usize,
    /// Set when effective support sits under the motion floor; the category
    /// is still reported, qualified.
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotionFindings {
    pub categories: Vec<MotionCategoryStat>,
    /// Weighted grant rate across all categorized motions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_grant_rate: Option<f64>,
    /// Motion cases whose type matched no recognized category.
    pub uncategorized_cases: usize,
}

#[derive(Default)]
struct CategoryAccum {
    raw: usize,
    weight: f64,
    granted_weight: f64,
    duration: WeightedStats,
}

pub fn analyze_motions(cases: &[WeightedCase], config: &AnalyticsConfig) -> MotionFindings {
    let mut accums: HashMap<&'static str, CategoryAccum> = HashMap::new();
    let mut uncategorized = 0usize;
    let mut overall_weight = 0.0;
    let mut overall_granted = 0.0;

    for case in cases {
        let Some(motion_type) = case.record.motion_type.as_deref() else {
            continue;
        };
        let Some(category) = categorize_motion(motion_type) else {
            uncategorized += 1;
            debug!(motion_type, "unrecognized motion type");
            continue;
        };

        let accum = accums.entry(category).or_default();
        accum.raw += 1;
        accum.weight += case.weight;
        overall_weight += case.weight;

        let granted = case
            .record
            .outcome_class()
            .map(|c| c.is_grant())
            .unwrap_or(false);
        if granted {
            accum.granted_weight += case.weight;
            overall_granted += case.weight;
        }

        // Timing needs both dates; grant rate keeps the case either way.
        if let Some(days) = case.record.decision_days() {
            accum.duration.add(days, case.weight);
        }
    }

    let mut categories: Vec<MotionCategoryStat> = MOTION_CATEGORIES
        .iter()
        .filter_map(|(key, _)| {
            let accum = accums.get(key)?;
            if accum.weight <= 0.0 {
                return None;
            }
            Some(MotionCategoryStat {
                category: key,
                sample_size: accum.raw,
                effective_sample_size: accum.weight,
                grant_rate: accum.granted_weight / accum.weight,
                mean_decision_days: accum.duration.mean(),
                timing_sample_size: accum.duration.count(),
                low_confidence: accum.weight < config.motion_support_floor,
            })
        })
        .collect();
    categories.sort_by(|a, b| a.category.cmp(b.category));

    MotionFindings {
        categories,
        overall_grant_rate: (overall_weight > 0.0).then(|| overall_granted / overall_weight),
        uncategorized_cases: uncategorized,
    }
}

impl MotionFindings {
    pub fn metric_rows(&self, config: &AnalyticsConfig) -> Vec<MetricRow> {
        let mut rows = Vec::with_capacity(self.categories.len() * 2);
        for stat in &self.categories {
            rows.push(MetricRow {
                dimension: Dimension::Motion,
                label: format!("motion/{}/grant_rate", stat.category),
                value: stat.grant_rate,
                sample_size: stat.sample_size,
                effective_sample_size: stat.effective_sample_size,
                confidence: local_confidence(
                    stat.effective_sample_size,
                    config.motion_support_floor,
                ),
                baseline_value: None,
                deviation_sigma: None,
                flagged: false,
            });
            if let Some(mean_days) = stat.mean_decision_days {
                rows.push(MetricRow {
                    dimension: Dimension::Motion,
                    label: format!("motion/{}/mean_decision_days", stat.category),
                    value: mean_days,
                    sample_size: stat.timing_sample_size,
                    effective_sample_size: stat.effective_sample_size,
                    confidence: local_confidence(
                        stat.effective_sample_size,
                        config.motion_support_floor,
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

    fn motion_case(motion: &str, outcome: &str, weight: f64) -> WeightedCase {
        WeightedCase {
            record: CaseRecord {
                motion_type: Some(motion.into()),
                outcome: Some(outcome.into()),
                filing_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                decision_date: NaiveDate::from_ymd_opt(2025, 3, 1),
                ..Default::default()
            },
            weight,
        }
    }

    #[test]
    fn recognizes_at_least_twelve_categories() {
        assert!(MOTION_CATEGORIES.len() >= 12);
    }

    #[test]
    fn categorization_prefers_specific_aliases() {
        assert_eq!(
            categorize_motion("Motion for Summary Judgment"),
            Some("summary_judgment")
        );
        assert_eq!(
            categorize_motion("motion for default judgment"),
            Some("default_judgment")
        );
        assert_eq!(categorize_motion("MOTION_TO_DISMISS"), Some("dismiss"));
        assert_eq!(categorize_motion("motion to knit"), None);
    }

    #[test]
    fn grant_rate_is_weighted_over_all_category_cases() {
        let cases = vec![
            motion_case("motion to dismiss", "granted", 1.0),
            motion_case("motion to dismiss", "denied", 1.0),
            motion_case("motion to dismiss", "granted", 2.0),
        ];
        let findings = analyze_motions(&cases, &AnalyticsConfig::default());
        let stat = findings
            .categories
            .iter()
            .find(|s| s.category == "dismiss")
            .unwrap();
        assert_eq!(stat.sample_size, 3);
        assert!((stat.grant_rate - 0.75).abs() < 1e-12);
        assert!(stat.low_confidence);
    }

    #[test]
    fn missing_dates_exclude_from_timing_not_grant_rate() {
        let mut undated = motion_case("motion to compel", "granted", 1.0);
        undated.record.filing_date = None;
        let cases = vec![undated, motion_case("motion to compel", "denied", 1.0)];
        let findings = analyze_motions(&cases, &AnalyticsConfig::default());
        let stat = findings
            .categories
            .iter()
            .find(|s| s.category == "compel_discovery")
            .unwrap();
        assert_eq!(stat.sample_size, 2);
        assert_eq!(stat.timing_sample_size, 1);
        assert!((stat.grant_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn small_categories_marked_low_confidence_despite_large_dataset() {
        let mut cases: Vec<WeightedCase> = (0..200)
            .map(|_| motion_case("summary judgment", "denied", 1.0))
            .collect();
        cases.push(motion_case("motion for sanctions", "granted", 1.0));
        let findings = analyze_motions(&cases, &AnalyticsConfig::default());
        let sj = findings
            .categories
            .iter()
            .find(|s| s.category == "summary_judgment")
            .unwrap();
        let sanctions = findings
            .categories
            .iter()
            .find(|s| s.category == "sanctions")
            .unwrap();
        assert!(!sj.low_confidence);
        assert!(sanctions.low_confidence);
    }
}

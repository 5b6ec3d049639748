//! Confidence scoring.
//!
//! The discrete tier is a pure function of effective case count over the
//! configured breakpoints. Data-quality sub-scores never move the tier;
//! they only interpolate the percentage within the tier's band.

use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

use crate::config::TierBreakpoints;
use crate::types::{ConfidenceAssessment, ConfidenceTier, DataQuality, WeightedCase};

/// Fixed blend weights for the overall quality score. Documented rather
/// than hidden: temporal distribution dominates, category diversity and
/// data freshness split the remainder.
pub const QUALITY_WEIGHT_TEMPORAL: f64 = 0.40;
pub const QUALITY_WEIGHT_DIVERSITY: f64 = 0.30;
pub const QUALITY_WEIGHT_FRESHNESS: f64 = 0.30;

/// Distinct case months beyond this contribute no extra temporal credit.
pub const FULL_CREDIT_MONTHS: u32 = 12;
/// Distinct case types needed for full diversity credit.
pub const CATEGORY_DIVERSITY_TARGET: usize = 5;

/// Tier assignment from effective case count alone.
pub fn tier_for(effective_case_count: f64, breakpoints: &TierBreakpoints) -> ConfidenceTier {
    if effective_case_count >= breakpoints.tier1 {
        ConfidenceTier::Tier1
    } else if effective_case_count >= breakpoints.tier2 {
        ConfidenceTier::Tier2
    } else if effective_case_count >= breakpoints.tier3 {
        ConfidenceTier::Tier3
    } else {
        ConfidenceTier::Limited
    }
}

/// Percentage within the tier band, linear in the overall quality score.
pub fn percentage_for(tier: ConfidenceTier, overall_quality: f64) -> f64 {
    let (low, high) = tier.band();
    low + overall_quality.clamp(0.0, 1.0) * (high - low)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Data-quality sub-scores over the weighted case set.
pub fn assess_quality(
    cases: &[WeightedCase],
    start_date: NaiveDate,
    end_date: NaiveDate,
    as_of: NaiveDate,
    freshness_window_years: f64,
) -> DataQuality {
    // Temporal distribution: months in range containing at least one case.
    let span_months = (month_index(end_date) - month_index(start_date) + 1).max(1) as u32;
    let denom = span_months.min(FULL_CREDIT_MONTHS).max(1);
    let mut case_months: HashSet<i32> = HashSet::new();
    for case in cases {
        if let Some(anchor) = case.record.decision_date.or(case.record.filing_date) {
            case_months.insert(month_index(anchor));
        }
    }
    let temporal = ((case_months.len() as u32).min(denom) as f64 / denom as f64).clamp(0.0, 1.0);

    // Category diversity relative to the fixed target.
    let case_types: HashSet<&str> = cases
        .iter()
        .filter_map(|c| c.record.case_type.as_deref())
        .collect();
    let diversity =
        (case_types.len().min(CATEGORY_DIVERSITY_TARGET) as f64) / CATEGORY_DIVERSITY_TARGET as f64;

    // Freshness: weighted share of cases decided inside the window.
    let window_days = (freshness_window_years * 365.25).round() as i64;
    let mut fresh_weight = 0.0;
    let mut total_weight = 0.0;
    for case in cases {
        total_weight += case.weight;
        if let Some(decided) = case.record.decision_date {
            let age_days = as_of.signed_duration_since(decided).num_days();
            if age_days <= window_days {
                fresh_weight += case.weight;
            }
        }
    }
    let freshness = if total_weight > 0.0 {
        (fresh_weight / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let overall = (QUALITY_WEIGHT_TEMPORAL * temporal
        + QUALITY_WEIGHT_DIVERSITY * diversity
        + QUALITY_WEIGHT_FRESHNESS * freshness)
        .clamp(0.0, 1.0);

    DataQuality {
        temporal_distribution: temporal,
        category_diversity: diversity,
        data_freshness: freshness,
        overall,
    }
}

/// Full assessment: pure tier from the breakpoints, percentage from the
/// quality blend. `force_limited` pins the tier without touching the
/// percentage logic.
pub fn assess(
    effective_case_count: f64,
    breakpoints: &TierBreakpoints,
    quality: &DataQuality,
    force_limited: bool,
) -> ConfidenceAssessment {
    let tier = if force_limited {
        ConfidenceTier::Limited
    } else {
        tier_for(effective_case_count, breakpoints)
    };
    ConfidenceAssessment {
        tier,
        percentage: percentage_for(tier, quality.overall),
    }
}

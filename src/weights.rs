//! Temporal decay weighting and the shared weighted-statistics helpers.
//!
//! Every downstream analyzer consumes decay weights instead of raw counts,
//! and all of them compute means, spreads, and quantiles through the helpers
//! here so the weighting logic exists exactly once.

use chrono::NaiveDate;
use tracing::debug;

use crate::types::{CaseRecord, WeightedCase};

const DAYS_PER_YEAR: f64 = 365.25;

/// A judge's case set after weighting. Undated cases carry zero weight:
/// they are excluded from every weighted aggregate but still counted in the
/// raw total.
#[derive(Debug, Clone)]
pub struct WeightedDataset {
    /// Cases with weight > 0, i.e. cases carrying at least one date.
    pub cases: Vec<WeightedCase>,
    pub total_cases: usize,
    pub undated_cases: usize,
    /// Sum of decay weights; always <= `total_cases`.
    pub effective_case_count: f64,
}

/// Computes a decayed weight per case from recency relative to a reference
/// date.
#[derive(Debug, Clone, Copy)]
pub struct TemporalWeightEngine {
    as_of: NaiveDate,
    decay_rate: f64,
}

impl TemporalWeightEngine {
    pub fn new(as_of: NaiveDate, decay_rate: f64) -> Self {
        Self { as_of, decay_rate }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Weight in (0, 1] for one case, anchored on the decision date with the
    /// filing date as fallback. `None` when the case carries no date at all.
    pub fn weight_for(&self, case: &CaseRecord) -> Option<f64> {
        let anchor = case.decision_date.or(case.filing_date)?;
        let years = self.as_of.signed_duration_since(anchor).num_days() as f64 / DAYS_PER_YEAR;
        // Future-dated records clamp to full weight rather than exceeding it.
        Some(self.decay_rate.powf(years.max(0.0)).min(1.0))
    }

    pub fn weigh(&self, cases: &[CaseRecord]) -> WeightedDataset {
        let total_cases = cases.len();
        let mut weighted = Vec::with_capacity(total_cases);
        let mut undated = 0usize;
        let mut effective = 0.0;

        for (idx, case) in cases.iter().enumerate() {
            match self.weight_for(case) {
                Some(weight) => {
                    effective += weight;
                    weighted.push(WeightedCase {
                        record: case.clone(),
                        weight,
                    });
                }
                None => {
                    undated += 1;
                    debug!(case_index = idx, "case has no usable date; excluded from weighted aggregates");
                }
            }
        }

        WeightedDataset {
            cases: weighted,
            total_cases,
            undated_cases: undated,
            effective_case_count: effective,
        }
    }
}

// =============================================================================
// Weighted statistics
// =============================================================================

/// Single-pass weight-aware mean/variance accumulator (West's update). Lets
/// baseline aggregation combine per-judge summaries without materializing
/// any judge's full case list.
#[derive(Debug, Clone, Default)]
pub struct WeightedStats {
    weight_sum: f64,
    mean: f64,
    m2: f64,
    count: usize,
}

impl WeightedStats {
    pub fn add(&mut self, value: f64, weight: f64) {
        if !(value.is_finite() && weight.is_finite()) || weight <= 0.0 {
            return;
        }
        self.count += 1;
        self.weight_sum += weight;
        let delta = value - self.mean;
        self.mean += (weight / self.weight_sum) * delta;
        self.m2 += weight * delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    pub fn mean(&self) -> Option<f64> {
        (self.weight_sum > 0.0).then_some(self.mean)
    }

    pub fn variance(&self) -> Option<f64> {
        (self.weight_sum > 0.0).then(|| (self.m2 / self.weight_sum).max(0.0))
    }

    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

/// Weighted quantile: sort by value, accumulate weight, interpolate at the
/// target weighted rank. `q` is clamped to [0, 1].
pub fn weighted_quantile(samples: &[(f64, f64)], q: f64) -> Option<f64> {
    let mut sorted: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .filter(|(v, w)| v.is_finite() && *w > 0.0)
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = sorted.iter().map(|(_, w)| w).sum();
    let target = q.clamp(0.0, 1.0) * total;

    let mut cum = 0.0;
    let mut prev_value = sorted[0].0;
    for (value, weight) in &sorted {
        let next = cum + weight;
        if next >= target {
            if cum <= 0.0 || target <= cum {
                return Some(if target <= cum { prev_value } else { *value });
            }
            let frac = (target - cum) / weight;
            return Some(prev_value + (value - prev_value) * frac);
        }
        cum = next;
        prev_value = *value;
    }
    Some(prev_value)
}

/// Weighted Pearson correlation over (x, y, weight) triples. `None` when
/// either marginal has no spread or no weight survives filtering.
pub fn weighted_correlation(samples: &[(f64, f64, f64)]) -> Option<f64> {
    let mut w_sum = 0.0;
    let mut x_mean = 0.0;
    let mut y_mean = 0.0;
    for (x, y, w) in samples {
        if !(x.is_finite() && y.is_finite()) || *w <= 0.0 {
            continue;
        }
        w_sum += w;
        x_mean += w * x;
        y_mean += w * y;
    }
    if w_sum <= 0.0 {
        return None;
    }
    x_mean /= w_sum;
    y_mean /= w_sum;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y, w) in samples {
        if !(x.is_finite() && y.is_finite()) || *w <= 0.0 {
            continue;
        }
        let dx = x - x_mean;
        let dy = y - y_mean;
        cov += w * dx * dy;
        var_x += w * dx * dx;
        var_y += w * dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

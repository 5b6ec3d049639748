//! Anomaly detection against jurisdiction peer baselines.
//!
//! A metric is flagged only when the deviation clears the sigma threshold
//! AND the judge-side metric carries enough effective support of its own.
//! A solid baseline never rescues a thin judge-side sample.

use statrs::function::erf::erf;
use std::collections::HashMap;
use std::f64::consts::SQRT_2;

use crate::baseline::BaselineProfile;
use crate::config::AnalyticsConfig;
use crate::types::{AnomalyFlag, AnomalySeverity, Dimension, MetricRow};

/// |sigma| at which a flag escalates from moderate to high.
const HIGH_SEVERITY_SIGMA: f64 = 3.0;

pub(crate) fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Gaussian two-sided tail probability for a deviation of |sigma|.
fn two_sided_p_value(sigma: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(sigma.abs()))).clamp(0.0, 1.0)
}

/// Annotate metric rows with their baseline deviations and return flags for
/// the significant ones. Rows without a usable baseline (missing profile,
/// peer floor unmet, zero spread) are left untouched.
pub fn detect(
    rows: &mut [MetricRow],
    baselines: &HashMap<(Dimension, String), BaselineProfile>,
    config: &AnalyticsConfig,
) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();

    for row in rows.iter_mut() {
        let Some(profile) = baselines.get(&(row.dimension, row.label.clone())) else {
            continue;
        };
        if profile.sample_size < config.minimum_peer_judges {
            continue;
        }
        if profile.stddev <= 0.0 || !profile.stddev.is_finite() {
            // Zero peer spread makes the z-score undefined, not infinite.
            continue;
        }

        let sigma = (row.value - profile.mean) / profile.stddev;
        row.baseline_value = Some(profile.mean);
        row.deviation_sigma = Some(sigma);

        if sigma.abs() < config.anomaly_sigma_threshold {
            continue;
        }
        if row.effective_sample_size < config.anomaly_support_floor {
            continue;
        }

        row.flagged = true;
        let severity = if sigma.abs() >= HIGH_SEVERITY_SIGMA {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Moderate
        };
        let direction = if sigma > 0.0 { "above" } else { "below" };
        flags.push(AnomalyFlag {
            dimension: row.dimension,
            metric_ref: row.label.clone(),
            deviation_sigma: sigma,
            severity,
            p_value: two_sided_p_value(sigma),
            description: format!(
                "{} metric `{}` sits {:.1} standard deviations {} the {} peer baseline ({:.3} vs {:.3})",
                row.dimension, row.label, sigma.abs(), direction, profile.jurisdiction,
                row.value, profile.mean,
            ),
        });
    }

    flags.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| {
                b.deviation_sigma
                    .abs()
                    .partial_cmp(&a.deviation_sigma.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.metric_ref.cmp(&b.metric_ref))
    });
    flags
}

//! Analysis configuration.
//!
//! Every threshold the pipeline consults lives here, supplied by the caller
//! and passed through explicitly. Nothing is read from the environment and
//! no module hardcodes its own floor.

use std::time::Duration;

/// Effective-case-count breakpoints for the discrete confidence tiers.
/// Values are weighted counts; the table governs assignments at or above
/// the `tier3` boundary only.
#[derive(Debug, Clone, Copy)]
pub struct TierBreakpoints {
    pub tier1: f64,
    pub tier2: f64,
    pub tier3: f64,
}

impl Default for TierBreakpoints {
    fn default() -> Self {
        Self {
            tier1: 1000.0,
            tier2: 750.0,
            tier3: 500.0,
        }
    }
}

/// Configuration for a bias-pattern analysis run.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    // -- Temporal weighting ---------------------------------------------------

    /// Per-year decay applied to each case's contribution. A case decided
    /// `y` years before the reference date contributes `decay_rate^y`.
    pub decay_rate: f64,

    // -- Dataset floors -------------------------------------------------------

    /// Raw case count below which the run degrades to headline counts only.
    pub minimum_raw_cases: usize,
    /// Contributing judges required before a peer baseline exists at all.
    pub minimum_peer_judges: usize,

    // -- Confidence -----------------------------------------------------------

    pub tier_breakpoints: TierBreakpoints,
    /// Years within which a decision still counts as fresh.
    pub freshness_window_years: f64,

    // -- Anomaly detection ----------------------------------------------------

    /// Minimum |sigma| against the peer baseline before a metric is flagged.
    pub anomaly_sigma_threshold: f64,
    /// Judge-side effective support a metric needs before it may be flagged,
    /// regardless of how solid the baseline is.
    pub anomaly_support_floor: f64,

    // -- Per-dimension support floors ----------------------------------------

    /// Effective support below which a motion category is low-confidence.
    pub motion_support_floor: f64,
    /// Effective support below which a timing tier is low-confidence.
    pub timing_support_floor: f64,
    /// Effective support below which a party/representation cell is omitted
    /// entirely rather than reported as a thin rate.
    pub party_cell_floor: f64,
    /// Effective support below which a value bracket is excluded from
    /// correlation computation.
    pub correlation_support_floor: f64,

    // -- Baseline cache -------------------------------------------------------

    pub baseline_ttl: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.95,
            minimum_raw_cases: 200,
            minimum_peer_judges: 5,
            tier_breakpoints: TierBreakpoints::default(),
            freshness_window_years: 2.0,
            anomaly_sigma_threshold: 2.0,
            anomaly_support_floor: 20.0,
            motion_support_floor: 10.0,
            timing_support_floor: 10.0,
            party_cell_floor: 20.0,
            correlation_support_floor: 15.0,
            baseline_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("decay_rate must be in (0, 1], got {0}")]
    DecayRate(f64),
    #[error("tier breakpoints must be finite and strictly descending: {0} / {1} / {2}")]
    Breakpoints(f64, f64, f64),
    #[error("{name} must be a finite value > 0, got {value}")]
    Threshold { name: &'static str, value: f64 },
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.decay_rate.is_finite() || self.decay_rate <= 0.0 || self.decay_rate > 1.0 {
            return Err(ConfigError::DecayRate(self.decay_rate));
        }
        let bp = &self.tier_breakpoints;
        let descending = bp.tier1 > bp.tier2 && bp.tier2 > bp.tier3 && bp.tier3 > 0.0;
        if !(bp.tier1.is_finite() && bp.tier2.is_finite() && bp.tier3.is_finite() && descending) {
            return Err(ConfigError::Breakpoints(bp.tier1, bp.tier2, bp.tier3));
        }
        for (name, value) in [
            ("anomaly_sigma_threshold", self.anomaly_sigma_threshold),
            ("anomaly_support_floor", self.anomaly_support_floor),
            ("motion_support_floor", self.motion_support_floor),
            ("timing_support_floor", self.timing_support_floor),
            ("party_cell_floor", self.party_cell_floor),
            ("correlation_support_floor", self.correlation_support_floor),
            ("freshness_window_years", self.freshness_window_years),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        Ok(())
    }
}

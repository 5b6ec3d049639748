//! Per-dimension analyzers.
//!
//! Each analyzer consumes the shared weighted case set, holds no mutable
//! state of its own, and produces a findings struct plus metric rows for
//! the report table. The four dimensions are mutually independent and run
//! as parallel tasks inside a single report build.

pub mod motion;
pub mod party;
pub mod timing;
pub mod value;

/// Dimension-local confidence on a 0-100 scale: a saturating curve in the
/// effective sample size relative to the dimension's support floor. Reaches
/// 50 at the floor and approaches 100 as support grows. Independent of the
/// report-level tier.
pub(crate) fn local_confidence(effective_sample_size: f64, support_floor: f64) -> f64 {
    if support_floor <= 0.0 {
        return 100.0;
    }
    let eff = effective_sample_size.max(0.0);
    (100.0 * eff / (eff + support_floor)).clamp(0.0, 100.0)
}

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use benchlens::{
    AnalyticsConfig, AnomalySeverity, BaselineCalculator, BaselineError, CaseRecord, Dimension,
    JudgeMetricSummary, MemoryBaselineCache, PeerSummaryProvider, ReportBuilder, ReportRequest,
    ReportRunOptions,
};

struct FixedProvider {
    summaries: Vec<JudgeMetricSummary>,
    calls: AtomicUsize,
}

#[async_trait]
impl PeerSummaryProvider for FixedProvider {
    async fn summaries_for(
        &self,
        _jurisdiction: &str,
    ) -> Result<Vec<JudgeMetricSummary>, BaselineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summaries.clone())
    }
}

struct FailingProvider;

#[async_trait]
impl PeerSummaryProvider for FailingProvider {
    async fn summaries_for(
        &self,
        _jurisdiction: &str,
    ) -> Result<Vec<JudgeMetricSummary>, BaselineError> {
        Err(BaselineError::Provider("backing store offline".into()))
    }
}

fn dismissal_peers(judges: usize) -> Vec<JudgeMetricSummary> {
    (0..judges)
        .map(|i| JudgeMetricSummary {
            judge_id: format!("peer-{i}"),
            dimension: Dimension::Motion,
            metric_key: "motion/dismiss/grant_rate".to_string(),
            value: 0.28 + 0.01 * (i % 5) as f64,
            weight: 120.0,
        })
        .collect()
}

fn end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
}

/// 240 recent dismissal motions, 90% granted: far above the peer rate.
fn outlier_judge_cases() -> Vec<CaseRecord> {
    (0..240)
        .map(|i| {
            let decided = end_date() - Duration::days((i % 360) as i64);
            CaseRecord {
                case_type: Some("contract".to_string()),
                outcome: Some(if i % 10 < 9 { "granted" } else { "denied" }.to_string()),
                filing_date: Some(decided - Duration::days(60)),
                decision_date: Some(decided),
                case_value: Some(40_000.0),
                motion_type: Some("motion to dismiss".to_string()),
                ..Default::default()
            }
        })
        .collect()
}

fn request() -> ReportRequest {
    ReportRequest {
        judge_id: "judge-9".to_string(),
        jurisdiction: "king_county".to_string(),
        start_date: end_date() - Duration::days(360),
        end_date: end_date(),
    }
}

fn builder_with(provider: Arc<dyn PeerSummaryProvider>) -> ReportBuilder {
    let config = AnalyticsConfig::default();
    let calculator = Arc::new(BaselineCalculator::new(
        provider,
        Arc::new(MemoryBaselineCache::new()),
        &config,
    ));
    ReportBuilder::new(config).unwrap().with_baselines(calculator)
}

#[tokio::test]
async fn extreme_deviation_from_peers_is_flagged_high() {
    let provider = Arc::new(FixedProvider {
        summaries: dismissal_peers(6),
        calls: AtomicUsize::new(0),
    });
    let builder = builder_with(provider.clone());
    let report = builder
        .build(&request(), &outlier_judge_cases(), &ReportRunOptions::default(), None)
        .await
        .unwrap();

    let flag = report
        .flagged_anomalies
        .iter()
        .find(|f| f.metric_ref == "motion/dismiss/grant_rate")
        .expect("dismissal grant rate should be flagged");
    assert_eq!(flag.severity, AnomalySeverity::High);
    assert!(flag.deviation_sigma > 3.0);
    assert!(flag.p_value < 0.01);

    let comparison = report
        .detailed_findings
        .baseline_comparison
        .expect("baseline comparison section");
    assert_eq!(comparison.jurisdiction, "king_county");
    assert!(comparison.rows_compared >= 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_profile_lookups_are_served_from_cache() {
    let provider = Arc::new(FixedProvider {
        summaries: dismissal_peers(6),
        calls: AtomicUsize::new(0),
    });
    let config = AnalyticsConfig::default();
    let calculator = BaselineCalculator::new(
        provider.clone(),
        Arc::new(MemoryBaselineCache::new()),
        &config,
    );

    let first = calculator
        .profile("king_county", Dimension::Motion, "motion/dismiss/grant_rate")
        .await
        .unwrap()
        .expect("profile above the peer floor");
    let second = calculator
        .profile("king_county", Dimension::Motion, "motion/dismiss/grant_rate")
        .await
        .unwrap()
        .expect("cached profile");

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.mean, second.mean);
    assert_eq!(first.sample_size, 6);
}

#[tokio::test]
async fn four_peer_judges_produce_no_baseline_and_no_flags() {
    let provider = Arc::new(FixedProvider {
        summaries: dismissal_peers(4),
        calls: AtomicUsize::new(0),
    });
    let builder = builder_with(provider);
    let report = builder
        .build(&request(), &outlier_judge_cases(), &ReportRunOptions::default(), None)
        .await
        .unwrap();

    assert!(report.flagged_anomalies.is_empty());
    assert!(report.detailed_findings.baseline_comparison.is_none());
    assert!(report
        .methodology_notes
        .iter()
        .any(|n| n.contains("peer")));
}

#[tokio::test]
async fn provider_failure_degrades_to_a_report_without_comparison() {
    let builder = builder_with(Arc::new(FailingProvider));
    let report = builder
        .build(&request(), &outlier_judge_cases(), &ReportRunOptions::default(), None)
        .await
        .unwrap();

    assert!(report.flagged_anomalies.is_empty());
    assert!(report.detailed_findings.baseline_comparison.is_none());
    assert!(report
        .methodology_notes
        .iter()
        .any(|n| n.contains("unavailable")));
}

#[tokio::test]
async fn cache_only_runs_never_touch_the_provider() {
    let provider = Arc::new(FixedProvider {
        summaries: dismissal_peers(6),
        calls: AtomicUsize::new(0),
    });
    let builder = builder_with(provider.clone());
    let options = ReportRunOptions {
        baseline_cache_only: true,
        ..Default::default()
    };
    let report = builder
        .build(&request(), &outlier_judge_cases(), &options, None)
        .await
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert!(report.detailed_findings.baseline_comparison.is_none());
    assert!(report.flagged_anomalies.is_empty());
}

#[tokio::test]
async fn thin_judge_metrics_are_not_flagged_against_solid_baselines() {
    // Peers agree tightly, but the judge has only a handful of sanctions
    // motions: the judge-side support floor keeps the metric unflagged.
    let mut summaries = dismissal_peers(6);
    summaries.extend((0..6).map(|i| JudgeMetricSummary {
        judge_id: format!("peer-{i}"),
        dimension: Dimension::Motion,
        metric_key: "motion/sanctions/grant_rate".to_string(),
        value: 0.08 + 0.01 * (i % 3) as f64,
        weight: 80.0,
    }));
    let provider = Arc::new(FixedProvider {
        summaries,
        calls: AtomicUsize::new(0),
    });
    let builder = builder_with(provider);

    let mut cases = outlier_judge_cases();
    // 8 granted sanctions motions: a 100% rate on 8 effective cases.
    cases.extend((0..8).map(|i| CaseRecord {
        outcome: Some("granted".to_string()),
        filing_date: Some(end_date() - Duration::days(90 + i as i64)),
        decision_date: Some(end_date() - Duration::days(30 + i as i64)),
        motion_type: Some("motion for sanctions".to_string()),
        ..Default::default()
    }));

    let report = builder
        .build(&request(), &cases, &ReportRunOptions::default(), None)
        .await
        .unwrap();

    assert!(!report
        .flagged_anomalies
        .iter()
        .any(|f| f.metric_ref == "motion/sanctions/grant_rate"));
    // The dismissal outlier is still caught.
    assert!(report
        .flagged_anomalies
        .iter()
        .any(|f| f.metric_ref == "motion/dismiss/grant_rate"));
}

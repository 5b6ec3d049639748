//! Jurisdiction peer baselines.
//!
//! Baselines aggregate per-judge weighted metric summaries, never full case
//! lists, so a jurisdiction-wide pass stays single-pass and bounded. A
//! profile below the peer-judge floor is absent, not approximated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{BaselineCache, BaselineCacheKey, CacheError};
use crate::config::AnalyticsConfig;
use crate::types::Dimension;
use crate::weights::WeightedStats;

/// Peer mean/stddev for one metric in one jurisdiction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub jurisdiction: String,
    pub dimension: Dimension,
    pub metric_key: String,
    pub mean: f64,
    pub stddev: f64,
    /// Contributing judges.
    pub sample_size: usize,
    pub computed_at: DateTime<Utc>,
}

/// One judge's weighted aggregate for a single metric, as supplied by the
/// data-access collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeMetricSummary {
    pub judge_id: String,
    pub dimension: Dimension,
    pub metric_key: String,
    /// The judge's weighted metric value.
    pub value: f64,
    /// Effective sample size behind the value.
    pub weight: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("peer summary provider error: {0}")]
    Provider(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Collaborator yielding every judge's metric summaries for a jurisdiction.
#[async_trait]
pub trait PeerSummaryProvider: Send + Sync {
    async fn summaries_for(
        &self,
        jurisdiction: &str,
    ) -> Result<Vec<JudgeMetricSummary>, BaselineError>;
}

/// Combine per-judge summaries into a peer mean/stddev, or nothing when
/// fewer than `minimum_judges` distinct judges contribute.
pub fn combine_summaries(
    summaries: &[JudgeMetricSummary],
    minimum_judges: usize,
) -> Option<(f64, f64, usize)> {
    let judges: HashSet<&str> = summaries.iter().map(|s| s.judge_id.as_str()).collect();
    if judges.len() < minimum_judges {
        return None;
    }
    let mut stats = WeightedStats::default();
    for summary in summaries {
        stats.add(summary.value, summary.weight);
    }
    let mean = stats.mean()?;
    let stddev = stats.stddev()?;
    Some((mean, stddev, judges.len()))
}

/// Computes and caches peer baseline profiles.
pub struct BaselineCalculator {
    provider: Arc<dyn PeerSummaryProvider>,
    cache: Arc<dyn BaselineCache>,
    minimum_peer_judges: usize,
    ttl: Duration,
}

impl BaselineCalculator {
    pub fn new(
        provider: Arc<dyn PeerSummaryProvider>,
        cache: Arc<dyn BaselineCache>,
        config: &AnalyticsConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            minimum_peer_judges: config.minimum_peer_judges,
            ttl: config.baseline_ttl,
        }
    }

    pub fn minimum_peer_judges(&self) -> usize {
        self.minimum_peer_judges
    }

    /// Single-metric convenience wrapper around [`Self::profiles`].
    pub async fn profile(
        &self,
        jurisdiction: &str,
        dimension: Dimension,
        metric_key: &str,
    ) -> Result<Option<BaselineProfile>, BaselineError> {
        let keys = vec![(dimension, metric_key.to_string())];
        let mut map = self.profiles(jurisdiction, &keys, false).await?;
        Ok(map.remove(&(dimension, metric_key.to_string())))
    }

    /// Resolve profiles for a set of metric keys. Cached profiles are served
    /// as-is; on any miss the provider is consulted once and every missing
    /// profile is recomputed and atomically replaced in the cache. With
    /// `cache_only`, misses simply stay absent.
    pub async fn profiles(
        &self,
        jurisdiction: &str,
        keys: &[(Dimension, String)],
        cache_only: bool,
    ) -> Result<HashMap<(Dimension, String), BaselineProfile>, BaselineError> {
        let cache_keys: Vec<BaselineCacheKey> = keys
            .iter()
            .map(|(dim, key)| BaselineCacheKey::new(jurisdiction, *dim, key))
            .collect();

        let lookups = join_all(cache_keys.iter().map(|key| self.cache.get(key))).await;

        let mut resolved = HashMap::new();
        let mut misses = Vec::new();
        for ((dim, key), cached) in keys.iter().zip(lookups) {
            match cached? {
                Some(profile) => {
                    resolved.insert((*dim, key.clone()), profile);
                }
                None => misses.push((*dim, key.clone())),
            }
        }

        if misses.is_empty() || cache_only {
            if !misses.is_empty() {
                debug!(
                    jurisdiction,
                    misses = misses.len(),
                    "cache-only baseline lookup left metrics unresolved"
                );
            }
            return Ok(resolved);
        }

        let summaries = self.provider.summaries_for(jurisdiction).await?;
        let mut grouped: HashMap<(Dimension, &str), Vec<&JudgeMetricSummary>> = HashMap::new();
        for summary in &summaries {
            grouped
                .entry((summary.dimension, summary.metric_key.as_str()))
                .or_default()
                .push(summary);
        }

        let computed_at = Utc::now();
        for (dim, key) in misses {
            let Some(group) = grouped.get(&(dim, key.as_str())) else {
                continue;
            };
            let owned: Vec<JudgeMetricSummary> = group.iter().map(|s| (*s).clone()).collect();
            let Some((mean, stddev, judges)) =
                combine_summaries(&owned, self.minimum_peer_judges)
            else {
                debug!(
                    jurisdiction,
                    metric_key = %key,
                    "peer-judge floor not met; no baseline profile"
                );
                continue;
            };
            let profile = BaselineProfile {
                jurisdiction: jurisdiction.to_string(),
                dimension: dim,
                metric_key: key.clone(),
                mean,
                stddev,
                sample_size: judges,
                computed_at,
            };
            let cache_key = BaselineCacheKey::new(jurisdiction, dim, &key);
            self.cache.put(&cache_key, &profile, self.ttl).await?;
            resolved.insert((dim, key), profile);
        }

        Ok(resolved)
    }
}

use chrono::Utc;
use std::time::Duration;
use tempfile::tempdir;

use benchlens::{
    BaselineCache, BaselineCacheKey, BaselineProfile, Dimension, SqliteBaselineCache,
};

fn profile(metric_key: &str, mean: f64) -> BaselineProfile {
    BaselineProfile {
        jurisdiction: "king_county".to_string(),
        dimension: Dimension::Motion,
        metric_key: metric_key.to_string(),
        mean,
        stddev: 0.05,
        sample_size: 7,
        computed_at: Utc::now(),
    }
}

fn key(metric_key: &str) -> BaselineCacheKey {
    BaselineCacheKey::new("king_county", Dimension::Motion, metric_key)
}

#[tokio::test]
async fn round_trips_a_profile() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();

    let k = key("motion/dismiss/grant_rate");
    assert!(cache.get(&k).await.unwrap().is_none());

    cache
        .put(&k, &profile("motion/dismiss/grant_rate", 0.31), Duration::from_secs(3600))
        .await
        .unwrap();

    let fetched = cache.get(&k).await.unwrap().expect("cached profile");
    assert_eq!(fetched.mean, 0.31);
    assert_eq!(fetched.stddev, 0.05);
    assert_eq!(fetched.sample_size, 7);
    assert_eq!(fetched.dimension, Dimension::Motion);
    assert_eq!(fetched.jurisdiction, "king_county");
}

#[tokio::test]
async fn expired_entries_behave_as_misses() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();

    let k = key("motion/dismiss/grant_rate");
    cache
        .put(&k, &profile("motion/dismiss/grant_rate", 0.31), Duration::ZERO)
        .await
        .unwrap();

    assert!(cache.get(&k).await.unwrap().is_none());
}

#[tokio::test]
async fn put_replaces_the_whole_profile() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();

    let k = key("motion/dismiss/grant_rate");
    cache
        .put(&k, &profile("motion/dismiss/grant_rate", 0.31), Duration::from_secs(3600))
        .await
        .unwrap();
    let mut updated = profile("motion/dismiss/grant_rate", 0.44);
    updated.sample_size = 9;
    cache.put(&k, &updated, Duration::from_secs(3600)).await.unwrap();

    let fetched = cache.get(&k).await.unwrap().unwrap();
    assert_eq!(fetched.mean, 0.44);
    assert_eq!(fetched.sample_size, 9);
}

#[tokio::test]
async fn prune_drops_expired_rows_and_enforces_the_row_cap() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();

    cache
        .put(&key("metric/expired"), &profile("metric/expired", 0.1), Duration::ZERO)
        .await
        .unwrap();
    for i in 0..5 {
        let metric = format!("metric/live-{i}");
        cache
            .put(&key(&metric), &profile(&metric, 0.2), Duration::from_secs(3600))
            .await
            .unwrap();
    }

    let stats = cache.prune(Some(3)).await.unwrap();
    assert!(stats.deleted >= 1);
    assert_eq!(stats.remaining, 3);
}

#[tokio::test]
async fn exports_rows_as_jsonl() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();

    cache
        .put(
            &key("motion/dismiss/grant_rate"),
            &profile("motion/dismiss/grant_rate", 0.31),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    let out = dir.path().join("export.jsonl");
    cache.export_jsonl(&out).await.unwrap();
    let contents = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(row["metric_key"], "motion/dismiss/grant_rate");
    assert_eq!(row["dimension"], "motion");
}

#[tokio::test]
async fn exclusive_lock_is_obtainable() {
    let dir = tempdir().unwrap();
    let cache = SqliteBaselineCache::new(dir.path().join("baselines.sqlite")).unwrap();
    let _lock = cache.lock_exclusive().unwrap();
}

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use futures::FutureExt;
use kxian_cache::mem::MemCache;
use kxian_core::cache::entity::CacheOrigin;
use kxian_core::cache::port::Cache;
use kxian_core::common::time::ManualClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type TestCache = MemCache<String, u32, String>;

fn setup(capacity: usize) -> (Arc<TestCache>, Arc<ManualClock>) {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let cache = Arc::new(MemCache::new(
        capacity,
        Duration::from_secs(5),
        clock.clone(),
    ));
    (cache, clock)
}

async fn compute(
    cache: &TestCache,
    key: &str,
    ttl: Duration,
    counter: &Arc<AtomicUsize>,
    value: Result<u32, String>,
) -> (CacheOrigin, Result<u32, String>) {
    let counter = counter.clone();
    let cached = cache
        .get_or_compute(
            key.to_string(),
            ttl,
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                value
            }
            .boxed(),
        )
        .await;
    (cached.origin, cached.result)
}

#[tokio::test]
async fn test_hit_does_not_poll_producer() {
    let (cache, _) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    let first = compute(&cache, "quote", ttl, &counter, Ok(1)).await;
    assert_eq!(first, (CacheOrigin::Computed, Ok(1)));

    // 第二次生产者给出不同的值，但命中缓存不会执行它
    let second = compute(&cache, "quote", ttl, &counter, Ok(2)).await;
    assert_eq!(second, (CacheOrigin::Hit, Ok(1)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let (cache, clock) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    compute(&cache, "quote", ttl, &counter, Ok(1)).await;

    clock.advance(ChronoDuration::seconds(59));
    let (origin, _) = compute(&cache, "quote", ttl, &counter, Ok(2)).await;
    assert_eq!(origin, CacheOrigin::Hit);

    clock.advance(ChronoDuration::seconds(1));
    let refreshed = compute(&cache, "quote", ttl, &counter, Ok(2)).await;
    assert_eq!(refreshed, (CacheOrigin::Computed, Ok(2)));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failure_uses_negative_ttl() {
    let (cache, clock) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(300);

    let failed = compute(&cache, "history", ttl, &counter, Err("down".into())).await;
    assert_eq!(failed, (CacheOrigin::Computed, Err("down".to_string())));

    // 负缓存期内直接返回失败
    clock.advance(ChronoDuration::seconds(4));
    let cached = compute(&cache, "history", ttl, &counter, Ok(7)).await;
    assert_eq!(cached, (CacheOrigin::Hit, Err("down".to_string())));

    // 负缓存 5 秒后过期，即使正向 TTL 为 300 秒
    clock.advance(ChronoDuration::seconds(1));
    let recovered = compute(&cache, "history", ttl, &counter, Ok(7)).await;
    assert_eq!(recovered, (CacheOrigin::Computed, Ok(7)));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_negative_ttl_capped_by_positive_ttl() {
    let (cache, clock) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(2);

    compute(&cache, "quote", ttl, &counter, Err("down".into())).await;
    clock.advance(ChronoDuration::seconds(2));
    let (origin, result) = compute(&cache, "quote", ttl, &counter, Ok(3)).await;
    assert_eq!(origin, CacheOrigin::Computed);
    assert_eq!(result, Ok(3));
}

#[tokio::test]
async fn test_lru_evicts_least_recently_used() {
    let (cache, _) = setup(2);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    compute(&cache, "a", ttl, &counter, Ok(1)).await;
    compute(&cache, "b", ttl, &counter, Ok(2)).await;
    // 访问 a，使 b 成为最久未用
    compute(&cache, "a", ttl, &counter, Ok(0)).await;
    compute(&cache, "c", ttl, &counter, Ok(3)).await;
    assert_eq!(cache.len(), 2);

    let (a_origin, _) = compute(&cache, "a", ttl, &counter, Ok(0)).await;
    let (b_origin, b_value) = compute(&cache, "b", ttl, &counter, Ok(20)).await;
    assert_eq!(a_origin, CacheOrigin::Hit);
    assert_eq!(b_origin, CacheOrigin::Computed);
    assert_eq!(b_value, Ok(20));
}

#[tokio::test]
async fn test_invalidate_forces_recompute() {
    let (cache, _) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    compute(&cache, "profile", ttl, &counter, Ok(1)).await;
    cache.invalidate(&"profile".to_string());
    assert!(cache.is_empty());

    let (origin, _) = compute(&cache, "profile", ttl, &counter, Ok(1)).await;
    assert_eq!(origin, CacheOrigin::Computed);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_computation() {
    let (cache, _) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        let counter = counter.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(
                    "history".to_string(),
                    Duration::from_secs(60),
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    }
                    .boxed(),
                )
                .await
        }));
    }

    let mut origins = Vec::new();
    for handle in handles {
        let cached = handle.await.unwrap();
        assert_eq!(cached.result, Ok(42));
        origins.push(cached.origin);
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let computed = origins
        .iter()
        .filter(|o| **o == CacheOrigin::Computed)
        .count();
    assert_eq!(computed, 1);
    assert!(
        origins
            .iter()
            .all(|o| matches!(o, CacheOrigin::Computed | CacheOrigin::Shared))
    );
}

#[tokio::test]
async fn test_concurrent_failure_is_shared() {
    let (cache, _) = setup(16);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        let counter = counter.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(
                    "news".to_string(),
                    Duration::from_secs(60),
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err::<u32, String>("rate limited".to_string())
                    }
                    .boxed(),
                )
                .await
        }));
    }

    for handle in handles {
        let cached = handle.await.unwrap();
        assert_eq!(cached.result, Err("rate limited".to_string()));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_leader_hands_over_to_waiter() {
    let (cache, _) = setup(16);

    let leader_cache = cache.clone();
    let leader = tokio::spawn(async move {
        leader_cache
            .get_or_compute(
                "quote".to_string(),
                Duration::from_secs(60),
                async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(1)
                }
                .boxed(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let follower_cache = cache.clone();
    let follower = tokio::spawn(async move {
        follower_cache
            .get_or_compute(
                "quote".to_string(),
                Duration::from_secs(60),
                async { Ok(2) }.boxed(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    leader.abort();
    let cached = tokio::time::timeout(Duration::from_secs(5), follower)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.origin, CacheOrigin::Computed);
    assert_eq!(cached.result, Ok(2));
    assert_eq!(cache.len(), 1);
}

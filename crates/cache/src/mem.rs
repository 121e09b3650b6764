use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::BoxFuture;
use kxian_core::cache::entity::{CacheOrigin, Cached};
use kxian_core::cache::port::Cache;
use kxian_core::common::time::TimeProvider;
use lru::LruCache;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

type Pending<V, E> = watch::Receiver<Option<Result<V, E>>>;

struct Slot<V, E> {
    result: Result<V, E>,
    // None 表示永不过期（TTL 超出时间表示范围）
    expires_at: Option<DateTime<Utc>>,
}

impl<V, E> Slot<V, E> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

struct State<K: Hash + Eq, V, E> {
    entries: LruCache<K, Slot<V, E>>,
    in_flight: HashMap<K, Pending<V, E>>,
}

enum Role<V, E> {
    Leader(watch::Sender<Option<Result<V, E>>>),
    Follower(Pending<V, E>),
}

/// # Summary
/// 基于 LRU 的内存记忆化缓存，带单飞合并与负缓存。
///
/// # Invariants
/// - 同一个键同一时刻最多一个生产者在执行，其余调用者订阅其结果。
/// - 内部互斥锁只保护簿记操作，绝不跨越生产者的 `await` 持有。
/// - 失败结果的有效期为 `min(negative_ttl, ttl)`。
/// - 生产者被取消（领导者 Future 被丢弃）时，进行中标记随之撤销，等待者之一接手计算。
/// - 过期判定只读取注入的 `TimeProvider`。
pub struct MemCache<K: Hash + Eq, V, E> {
    state: Mutex<State<K, V, E>>,
    clock: Arc<dyn TimeProvider>,
    negative_ttl: Duration,
}

impl<K, V, E> MemCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// # Summary
    /// 创建缓存实例。
    ///
    /// # Arguments
    /// * `capacity`: 最多保留的已落定条目数，0 按 1 处理。
    /// * `negative_ttl`: 失败结果的最长保留时间。
    /// * `clock`: 时间供给器。
    ///
    /// # Returns
    /// * `Self` - 初始化的缓存实例。
    pub fn new(capacity: usize, negative_ttl: Duration, clock: Arc<dyn TimeProvider>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
            clock,
            negative_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        let delta = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.clock.now().checked_add_signed(delta)
    }

    /// 查找有效条目；若无，则判定本次调用是领导者还是跟随者。
    fn claim(&self, key: &K) -> Result<Result<V, E>, Role<V, E>> {
        let mut state = self.lock();
        let now = self.clock.now();

        match state.entries.get(key) {
            Some(slot) if slot.is_live(now) => return Ok(slot.result.clone()),
            Some(_) => {
                state.entries.pop(key);
            }
            None => {}
        }

        if let Some(pending) = state.in_flight.get(key) {
            return Err(Role::Follower(pending.clone()));
        }

        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(key.clone(), rx);
        Err(Role::Leader(tx))
    }

    fn settle(&self, key: K, result: Result<V, E>, ttl: Duration) {
        let ttl = if result.is_err() {
            ttl.min(self.negative_ttl)
        } else {
            ttl
        };
        let expires_at = self.expiry(ttl);
        let mut state = self.lock();
        state.in_flight.remove(&key);
        if let Some((evicted, _)) = state.entries.push(key.clone(), Slot { result, expires_at })
            && evicted != key
        {
            tracing::debug!(key = ?evicted, "cache entry evicted");
        }
    }
}

/// 领导者在完成前被丢弃时撤销进行中标记。
struct FlightGuard<'c, K: Hash + Eq, V, E> {
    state: &'c Mutex<State<K, V, E>>,
    key: Option<K>,
}

impl<K: Hash + Eq, V, E> FlightGuard<'_, K, V, E> {
    fn disarm(&mut self) {
        self.key = None;
    }
}

impl<K: Hash + Eq, V, E> Drop for FlightGuard<'_, K, V, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight.remove(&key);
        }
    }
}

#[async_trait]
impl<K, V, E> Cache<K, V, E> for MemCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    async fn get_or_compute<'a>(
        &self,
        key: K,
        ttl: Duration,
        producer: BoxFuture<'a, Result<V, E>>,
    ) -> Cached<V, E> {
        let tx = loop {
            match self.claim(&key) {
                Ok(result) => {
                    return Cached {
                        origin: CacheOrigin::Hit,
                        result,
                    };
                }
                Err(Role::Leader(tx)) => break tx,
                Err(Role::Follower(mut rx)) => {
                    let shared = rx.wait_for(Option::is_some).await.map(|value| value.clone());
                    match shared {
                        Ok(Some(result)) => {
                            return Cached {
                                origin: CacheOrigin::Shared,
                                result,
                            };
                        }
                        // 领导者被取消，重新竞争
                        _ => {
                            tracing::debug!(key = ?key, "in-flight producer abandoned, retrying");
                        }
                    }
                }
            }
        };

        let mut guard = FlightGuard {
            state: &self.state,
            key: Some(key.clone()),
        };
        let result = producer.await;
        guard.disarm();

        self.settle(key, result.clone(), ttl);
        tx.send_replace(Some(result.clone()));

        Cached {
            origin: CacheOrigin::Computed,
            result,
        }
    }

    fn invalidate(&self, key: &K) {
        self.lock().entries.pop(key);
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

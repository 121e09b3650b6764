use crate::cache::entity::Cached;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

/// # Summary
/// 带单飞语义的异步记忆化缓存接口 (Port)。
///
/// # Invariants
/// - 同一进程内同一个键最多只有一个生产者在执行；并发的重复请求共享其结果（包括失败）。
/// - 生产者以惰性 Future 传入，命中缓存时不会被 poll。
/// - 任何锁都不得跨越生产者的执行（网络调用）持有。
/// - 失败结果按更短的负缓存 TTL 保存，防止反复冲击故障上游。
#[async_trait]
pub trait Cache<K, V, E>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    /// # Summary
    /// 读取缓存，未命中时执行生产者并写回。
    ///
    /// # Logic
    /// 1. 命中且未过期：直接返回，来源为 `Hit`。
    /// 2. 已有进行中的计算：等待并共享其结果，来源为 `Shared`。
    /// 3. 否则登记进行中标记，执行生产者，写回结果，来源为 `Computed`。
    ///
    /// # Arguments
    /// * `key`: 缓存键。
    /// * `ttl`: 成功结果的有效期。
    /// * `producer`: 惰性生产者。
    ///
    /// # Returns
    /// 结果及其来源。
    async fn get_or_compute<'a>(
        &self,
        key: K,
        ttl: Duration,
        producer: BoxFuture<'a, Result<V, E>>,
    ) -> Cached<V, E>;

    /// 移除指定键（不影响进行中的计算）。
    fn invalidate(&self, key: &K);

    /// 当前已落定的条目数（不含进行中的计算）。
    fn len(&self) -> usize;

    /// 是否没有任何已落定的条目。
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

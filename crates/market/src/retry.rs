use kxian_core::config::RetryConfig;
use kxian_core::market::error::MarketError;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::warn;

/// # Summary
/// 由重试配置生成退避间隔序列。
///
/// # Logic
/// 间隔依次为 `base`、`2 * base`、`4 * base`……，单次不超过 `max_delay_ms`，
/// 总数不超过 `max_retries`。`ExponentialBackoff` 产出 `2 * base`、`4 * base`……，减半后使用。
pub fn backoff(config: &RetryConfig) -> impl Iterator<Item = Duration> + use<> {
    let cap = Duration::from_millis(config.max_delay_ms);
    ExponentialBackoff::from_millis(2)
        .factor(config.base_delay_ms.max(1))
        .map(move |delay| (delay / 2).min(cap))
        .take(config.max_retries)
}

/// # Summary
/// 按指数退避重试一次上游调用，只对可重试错误生效。
///
/// # Logic
/// 1. 每次尝试把从 1 开始的尝试序号传给 `operation`。
/// 2. `UpstreamUnavailable` 与 `RateLimited` 在退避后重试。
/// 3. 其余错误立即返回；重试次数耗尽后返回最后一次的错误。
///
/// # Arguments
/// * `config`: 重试配置。
/// * `operation`: 单次尝试，参数为尝试序号。
///
/// # Returns
/// 首个成功结果或最终错误。
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, MarketError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, MarketError>>,
{
    let mut attempt = 0u32;
    RetryIf::spawn(
        backoff(config),
        || {
            attempt = attempt.saturating_add(1);
            operation(attempt)
        },
        |error: &MarketError| {
            let retry = error.is_retryable();
            if retry {
                warn!(kind = error.kind(), "Retryable upstream error: {}", error);
            }
            retry
        },
    )
    .await
}

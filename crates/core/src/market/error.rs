use serde::{Deserialize, Serialize};
use thiserror::Error;

/// # Summary
/// 市场数据域错误枚举，覆盖代码校验、网络、限流及报文结构问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 必须可 `Clone`：单飞缓存需要把同一个失败结果分享给所有并发等待者，负缓存也要保存它。
/// - 错误信息只包含可展示的摘要，不包含调用栈等内部细节。
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketError {
    // 代码格式非法或无法识别，在发起网络请求前快速失败
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
    // 网络故障、超时或非成功响应
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    // 数据源限流
    #[error("Rate limited: {0}")]
    RateLimited(String),
    // 报文结构无法按字段级降级恢复，例如缺少外层信封
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl MarketError {
    /// # Summary
    /// 判断错误是否值得由编排器重试。
    ///
    /// # Returns
    /// 仅 `UpstreamUnavailable` 与 `RateLimited` 返回 true。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::UpstreamUnavailable(_) | MarketError::RateLimited(_)
        )
    }

    /// 错误种类的稳定短名，用于审计记录与日志字段。
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::InvalidSymbol(_) => "invalid-symbol",
            MarketError::UpstreamUnavailable(_) => "upstream-unavailable",
            MarketError::RateLimited(_) => "rate-limited",
            MarketError::MalformedPayload(_) => "malformed-payload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(MarketError::UpstreamUnavailable("timeout".into()).is_retryable());
        assert!(MarketError::RateLimited("429".into()).is_retryable());
        assert!(!MarketError::InvalidSymbol("x".into()).is_retryable());
        assert!(!MarketError::MalformedPayload("x".into()).is_retryable());
        assert_eq!(MarketError::RateLimited("429".into()).kind(), "rate-limited");
    }
}

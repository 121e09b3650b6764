use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub audit: AuditConfig,
    pub request: RequestConfig,
    pub logging: LoggingConfig,
}

/// 数据源配置，token 由外部配置源提供，引擎视为不透明参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.zhituapi.com".to_string(),
            token: String::new(),
            timeout_secs: 10,
        }
    }
}

/// # Summary
/// 缓存配置。
///
/// # Invariants
/// - `negative_ttl_secs` 应小于所有正向 TTL，编排器取二者较小值。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub negative_ttl_secs: u64,
    pub profile_ttl_secs: u64,
    pub quote_ttl_secs: u64,
    pub history_ttl_secs: u64,
    pub news_ttl_secs: u64,
    // 证券目录快照的有效期
    pub directory_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            negative_ttl_secs: 5,
            profile_ttl_secs: 86_400,
            quote_ttl_secs: 60,
            history_ttl_secs: 300,
            news_ttl_secs: 300,
            directory_ttl_secs: 7 * 86_400,
        }
    }
}

impl CacheConfig {
    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }
}

/// 重试配置：指数退避，仅作用于可重试错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    // 内存环形缓冲区容量，0 表示不保留
    pub ring_capacity: usize,
    // JSON Lines 审计文件路径
    pub json_path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 1_000,
            json_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider.base_url, "https://api.zhituapi.com");
        assert_eq!(config.cache.profile_ttl_secs, 86_400);
        assert_eq!(config.cache.quote_ttl_secs, 60);
        assert_eq!(config.cache.history_ttl_secs, 300);
        assert_eq!(config.cache.directory_ttl_secs, 604_800);
        assert!(config.cache.negative_ttl_secs < config.cache.quote_ttl_secs);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"provider": {"token": "T"}, "cache": {"capacity": 8}}"#)
                .unwrap();
        assert_eq!(config.provider.token, "T");
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.cache.quote_ttl_secs, 60);
    }
}

use config::{Config, ConfigError, Environment, File};
use kxian_core::config::AppConfig;
use std::path::Path;

// 环境变量前缀，例如 KXIAN__PROVIDER__TOKEN
const ENV_PREFIX: &str = "KXIAN";

/// # Summary
/// 分层加载应用配置。
///
/// # Logic
/// 1. 以 `AppConfig::default()` 作为底层默认值。
/// 2. 叠加可选的 TOML 配置文件（不存在时跳过）。
/// 3. 叠加 `KXIAN__SECTION__KEY` 形式的环境变量。
///
/// # Arguments
/// * `path`: 配置文件路径。
///
/// # Returns
/// 合并后的配置。
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.quote_ttl_secs, 60);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kxian.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[cache]\nquote_ttl_secs = 30\n\n[audit]\njson_path = \"logs/audit.jsonl\""
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.cache.quote_ttl_secs, 30);
        assert_eq!(config.cache.profile_ttl_secs, 86_400);
        assert_eq!(config.audit.json_path.as_deref(), Some("logs/audit.jsonl"));
    }
}

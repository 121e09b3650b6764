use crate::common::{Adjustment, Granularity, Symbol};
use crate::market::request::HistoryQuery;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// # Summary
/// 缓存的请求种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Profile,
    Quote,
    History,
    News,
    // 证券目录，不经过结果缓存
    Directory,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Profile => write!(f, "profile"),
            RequestKind::Quote => write!(f, "quote"),
            RequestKind::History => write!(f, "history"),
            RequestKind::News => write!(f, "news"),
            RequestKind::Directory => write!(f, "directory"),
        }
    }
}

/// # Summary
/// 缓存键：`(标的, 请求种类, 粒度, 复权, 起, 止, 条数, 指标参数指纹)`。
///
/// # Invariants
/// - 任一参数不同即为不同的键。
/// - 历史数据键必须携带指标参数指纹，指标结果不脱离序列单独缓存。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: Symbol,
    pub kind: RequestKind,
    pub granularity: Option<Granularity>,
    pub adjustment: Option<Adjustment>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub indicator_fingerprint: Option<String>,
}

impl CacheKey {
    fn bare(symbol: &Symbol, kind: RequestKind) -> Self {
        Self {
            symbol: symbol.clone(),
            kind,
            granularity: None,
            adjustment: None,
            start: None,
            end: None,
            limit: None,
            indicator_fingerprint: None,
        }
    }

    /// 基本资料键。
    pub fn profile(symbol: &Symbol) -> Self {
        Self::bare(symbol, RequestKind::Profile)
    }

    /// 实时行情键。
    pub fn quote(symbol: &Symbol) -> Self {
        Self::bare(symbol, RequestKind::Quote)
    }

    /// 资讯键，条数计入 `limit`。
    pub fn news(symbol: &Symbol, count: usize) -> Self {
        Self {
            limit: Some(count),
            ..Self::bare(symbol, RequestKind::News)
        }
    }

    /// 指标增强历史序列键。
    pub fn history(symbol: &Symbol, query: &HistoryQuery, fingerprint: &str) -> Self {
        Self {
            granularity: Some(query.granularity),
            adjustment: Some(query.adjustment),
            start: query.start,
            end: query.end,
            limit: query.limit,
            indicator_fingerprint: Some(fingerprint.to_string()),
            ..Self::bare(symbol, RequestKind::History)
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.symbol,
            self.kind,
            opt(self.granularity.map(|g| g.to_string())),
            opt(self.adjustment.map(|a| a.to_string())),
            opt(self.start.map(|d| d.to_string())),
            opt(self.end.map(|d| d.to_string())),
            opt(self.limit.map(|l| l.to_string())),
            opt(self.indicator_fingerprint.clone()),
        )
    }
}

/// # Summary
/// 结果来源：本次计算、缓存命中、或共享了并发进行中的计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheOrigin {
    Computed,
    Hit,
    Shared,
}

impl std::fmt::Display for CacheOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheOrigin::Computed => write!(f, "computed"),
            CacheOrigin::Hit => write!(f, "hit"),
            CacheOrigin::Shared => write!(f, "shared"),
        }
    }
}

/// # Summary
/// `get_or_compute` 的返回值：结果本身及其来源。
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V, E> {
    pub origin: CacheOrigin,
    pub result: Result<V, E>,
}

impl<V, E> Cached<V, E> {
    /// 丢弃来源信息，只取结果。
    pub fn into_result(self) -> Result<V, E> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_key_differs_by_every_parameter() {
        let symbol = Symbol::parse("600519.SH").unwrap();
        let query = HistoryQuery {
            granularity: Granularity::Day,
            adjustment: Adjustment::None,
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 3, 31),
            limit: None,
        };
        let base = CacheKey::history(&symbol, &query, "abc");

        assert_eq!(base, CacheKey::history(&symbol, &query, "abc"));
        assert_ne!(base, CacheKey::history(&symbol, &query, "abd"));
        let forward = HistoryQuery {
            adjustment: Adjustment::Forward,
            ..query.clone()
        };
        assert_ne!(base, CacheKey::history(&symbol, &forward, "abc"));
        let limited = HistoryQuery {
            limit: Some(10),
            ..query.clone()
        };
        assert_ne!(base, CacheKey::history(&symbol, &limited, "abc"));
        assert_ne!(CacheKey::profile(&symbol), CacheKey::quote(&symbol));
        assert_ne!(CacheKey::news(&symbol, 5), CacheKey::news(&symbol, 6));
    }

    #[test]
    fn test_display_is_readable() {
        let symbol = Symbol::parse("000001.SZ").unwrap();
        assert_eq!(
            CacheKey::quote(&symbol).to_string(),
            "000001.SZ:quote:-:-:-:-:-:-"
        );
    }
}

//! # 测试工具
//!
//! 仅在 `test-utils` 特性下编译，为下游 crate 的测试提供可编排的模拟数据源与样例数据。

use crate::cache::entity::RequestKind;
use crate::common::{Adjustment, Granularity, Symbol};
use crate::market::entity::{Bar, NewsItem, Profile, Series, SuspensionState};
use crate::market::error::MarketError;
use crate::market::port::{MarketDataProvider, NewsStream};
use crate::market::request::HistoryQuery;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

/// # Summary
/// 以收盘价序列构造日线 Series（从 2024-01-02 起逐日递增）。
///
/// # Logic
/// 开盘价等于收盘价，最高/最低价为收盘价 ±1，前收盘价取上一根收盘价（首根缺失）。
pub fn daily_series(symbol: &Symbol, closes: &[f64]) -> Series {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap_or_default();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            time: start + ChronoDuration::days(i64::try_from(i).unwrap_or(i64::MAX)),
            open: Some(close),
            high: Some(close + 1.0),
            low: Some(close - 1.0),
            close: Some(close),
            volume: Some(1_000.0),
            turnover: Some(close * 1_000.0),
            prev_close: i.checked_sub(1).and_then(|p| closes.get(p).copied()),
            suspended: false,
        })
        .collect();
    Series::from_unordered(
        symbol.clone(),
        Granularity::Day,
        Adjustment::None,
        bars,
        vec![],
    )
}

/// 模拟目录中的标的：(代码, 名称)。
const LISTINGS: [(&str, &str); 5] = [
    ("600519.SH", "贵州茅台"),
    ("000001.SZ", "平安银行"),
    ("300750.SZ", "宁德时代"),
    ("000001.SH", "上证指数"),
    ("399001.SZ", "深证成指"),
];

/// 模拟数据源的默认实时行情。
pub fn sample_quote() -> Bar {
    Bar {
        time: Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).single().unwrap_or_default(),
        open: Some(100.0),
        high: Some(102.0),
        low: Some(99.0),
        close: Some(101.0),
        volume: Some(12_000.0),
        turnover: Some(1_212_000.0),
        prev_close: Some(100.0),
        suspended: false,
    }
}

/// # Summary
/// 可编排的模拟行情数据源。
///
/// # Invariants
/// - 每次调用都会计数，无论成功与否。
/// - 预设的失败按先进先出顺序消费，消费完后恢复正常返回。
/// - 模拟延迟只作用于数据接口，目录加载不受影响。
pub struct MockProvider {
    calls: DashMap<RequestKind, usize>,
    failures: DashMap<RequestKind, VecDeque<MarketError>>,
    directory: Vec<Symbol>,
    quote: Bar,
    history: Option<Series>,
    news: Vec<NewsItem>,
    latency: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
            failures: DashMap::new(),
            directory: LISTINGS
                .iter()
                .filter_map(|(code, name)| Symbol::parse(code).ok().map(|s| s.with_name(*name)))
                .collect(),
            quote: sample_quote(),
            history: None,
            news: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// 替换证券目录；空目录表示不提供目录。
    pub fn with_directory(mut self, directory: Vec<Symbol>) -> Self {
        self.directory = directory;
        self
    }

    /// 替换实时行情。
    pub fn with_quote(mut self, quote: Bar) -> Self {
        self.quote = quote;
        self
    }

    /// 固定历史数据（标的会被替换为请求的标的）。
    pub fn with_history(mut self, series: Series) -> Self {
        self.history = Some(series);
        self
    }

    pub fn with_news(mut self, news: Vec<NewsItem>) -> Self {
        self.news = news;
        self
    }

    /// 每次调用前的模拟网络延迟。
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 预设下一次某类调用返回的错误，可多次调用排队。
    pub fn fail_next(&self, kind: RequestKind, error: MarketError) {
        self.failures.entry(kind).or_default().push_back(error);
    }

    /// 某类调用已被执行的次数。
    pub fn calls(&self, kind: RequestKind) -> usize {
        self.calls.get(&kind).map(|c| *c).unwrap_or(0)
    }

    /// 所有调用次数之和。
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| *c.value()).sum()
    }

    async fn enter(&self, kind: RequestKind) -> Result<(), MarketError> {
        *self.calls.entry(kind).or_insert(0) += 1;
        if kind != RequestKind::Directory && !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self
            .failures
            .get_mut(&kind)
            .and_then(|mut queue| queue.pop_front());
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_profile(&self, symbol: &Symbol) -> Result<Profile, MarketError> {
        self.enter(RequestKind::Profile).await?;
        Ok(Profile {
            symbol: symbol.with_name("模拟证券"),
            name: Some("模拟证券".to_string()),
            listing_date: chrono::NaiveDate::from_ymd_opt(2001, 8, 27),
            prev_close: Some(100.0),
            limit_up: Some(110.0),
            limit_down: Some(90.0),
            price_tick: Some(0.01),
            float_shares: Some(1.0e9),
            total_shares: Some(1.2e9),
            suspension: SuspensionState::Trading,
        })
    }

    async fn fetch_quote(&self, _symbol: &Symbol) -> Result<Bar, MarketError> {
        self.enter(RequestKind::Quote).await?;
        Ok(self.quote.clone())
    }

    async fn fetch_history(
        &self,
        symbol: &Symbol,
        query: &HistoryQuery,
    ) -> Result<Series, MarketError> {
        self.enter(RequestKind::History).await?;
        let closes: Vec<f64> = (0..40u32).map(|i| 100.0 + f64::from(i % 7) - f64::from(i % 3)).collect();
        let base = self
            .history
            .clone()
            .unwrap_or_else(|| daily_series(symbol, &closes));
        let series = Series {
            symbol: symbol.clone(),
            granularity: query.granularity,
            adjustment: query.adjustment,
            ..base
        };
        Ok(match query.limit {
            Some(limit) => series.tail(limit),
            None => series,
        })
    }

    async fn fetch_news(&self, _symbol: &Symbol, count: usize) -> Result<NewsStream, MarketError> {
        self.enter(RequestKind::News).await?;
        let items: Vec<NewsItem> = self.news.iter().take(count).cloned().collect();
        Ok(Box::pin(async_stream::stream! {
            for item in items {
                yield item;
            }
        }))
    }

    async fn fetch_directory(&self) -> Result<Vec<Symbol>, MarketError> {
        self.enter(RequestKind::Directory).await?;
        Ok(self.directory.clone())
    }
}

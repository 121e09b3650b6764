use crate::common::{Adjustment, Granularity, Symbol};
use crate::indicator::entity::{EnrichedSeries, IndicatorConfig};
use crate::market::entity::{NewsFeed, Profile, Quote};
use crate::market::error::MarketError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// # Summary
/// 历史行情查询参数（适配器层）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub granularity: Granularity,
    pub adjustment: Adjustment,
    // 起始日期（含）
    pub start: Option<NaiveDate>,
    // 截止日期（含）
    pub end: Option<NaiveDate>,
    // 只保留最近 N 根
    pub limit: Option<usize>,
}

/// # Summary
/// 需要抓取的数据分区。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub profile: bool,
    pub quote: bool,
    pub history: bool,
    // 资讯条数，None 表示不抓取
    pub news: Option<usize>,
}

impl Default for Sections {
    fn default() -> Self {
        Self {
            profile: true,
            quote: true,
            history: true,
            news: None,
        }
    }
}

/// # Summary
/// 请求完整性要求。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RequestMode {
    // 允许部分分区失败或超时，按分区返回状态
    #[default]
    Partial,
    // 任一分区失败即整体失败
    AllOrNothing,
}

/// # Summary
/// 编排器的一次数据请求。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    // 原始代码输入，由编排器规范化
    pub symbol: String,
    pub granularity: Granularity,
    pub adjustment: Adjustment,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub indicators: IndicatorConfig,
    pub sections: Sections,
    // 整个请求的超时上限，None 使用编排器默认值
    pub timeout: Option<Duration>,
    pub mode: RequestMode,
}

impl DataRequest {
    /// 以默认参数构造日线请求。
    pub fn daily(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            granularity: Granularity::Day,
            adjustment: Adjustment::None,
            start: None,
            end: None,
            limit: None,
            indicators: IndicatorConfig::default(),
            sections: Sections::default(),
            timeout: None,
            mode: RequestMode::Partial,
        }
    }

    /// 提取适配器层的历史查询参数。
    pub fn history_query(&self) -> HistoryQuery {
        HistoryQuery {
            granularity: self.granularity,
            adjustment: self.adjustment,
            start: self.start,
            end: self.end,
            limit: self.limit,
        }
    }
}

/// # Summary
/// 单个分区的结果状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Section<T> {
    Ready(T),
    Failed(MarketError),
    TimedOut,
    NotRequested,
}

impl<T> Section<T> {
    /// 已就绪时返回引用。
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// 请求了但未成功（失败或超时）。
    pub fn is_missing(&self) -> bool {
        matches!(self, Section::Failed(_) | Section::TimedOut)
    }
}

/// # Summary
/// 编排器输出的完整数据集。
///
/// # Invariants
/// - `complete` 为 true 当且仅当所有请求的分区就绪且历史序列无附注。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub symbol: Symbol,
    pub profile: Section<Profile>,
    pub quote: Section<Quote>,
    pub history: Section<EnrichedSeries>,
    pub news: Section<NewsFeed>,
    pub complete: bool,
}

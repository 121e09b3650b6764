use crate::common::{Adjustment, Granularity, Symbol};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 单根 K 线实体，记录特定时段内的行情波动。
///
/// # Invariants
/// - 非停牌且四价齐全时，`low <= {open, close} <= high`。
/// - 任一数值字段为 None 表示“未知”，不得当作 0 参与计算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    // K 线时间 (带时区，分钟级或日级精度)
    pub time: DateTime<Utc>,
    // 开盘价
    pub open: Option<f64>,
    // 最高价
    pub high: Option<f64>,
    // 最低价
    pub low: Option<f64>,
    // 收盘价
    pub close: Option<f64>,
    // 成交量
    pub volume: Option<f64>,
    // 成交额
    pub turnover: Option<f64>,
    // 前收盘价
    pub prev_close: Option<f64>,
    // 是否停牌
    pub suspended: bool,
}

impl Bar {
    /// # Summary
    /// 校验价格区间不变量。
    ///
    /// # Logic
    /// 1. 停牌或四价不全时不做校验，视为一致。
    /// 2. 否则要求开盘、收盘价都落在 [low, high] 内。
    ///
    /// # Returns
    /// 满足不变量返回 true。
    pub fn is_consistent(&self) -> bool {
        if self.suspended {
            return true;
        }
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => l <= o && l <= c && o <= h && c <= h,
            _ => true,
        }
    }

    /// # Summary
    /// 前收盘价缺失时以本根开盘价回填（非破坏性）。
    ///
    /// # Logic
    /// 1. 前收盘价已存在或开盘价也缺失时，原样克隆返回，不产生溯源记录。
    /// 2. 否则返回回填后的新 Bar 及一条溯源记录。
    ///
    /// # Returns
    /// (新 Bar, 可选的溯源记录)。
    pub fn with_prev_close_fallback(&self) -> (Bar, Option<Provenance>) {
        match (self.prev_close, self.open) {
            (None, Some(open)) => {
                let filled = Bar {
                    prev_close: Some(open),
                    ..self.clone()
                };
                let note = Provenance {
                    time: self.time,
                    field: BarField::PrevClose,
                    source: BarField::Open,
                };
                (filled, Some(note))
            }
            _ => (self.clone(), None),
        }
    }
}

/// # Summary
/// Bar 的字段名枚举，用于溯源与拒收原因描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Time,
    Open,
    High,
    Low,
    Close,
    Volume,
    Turnover,
    PrevClose,
    Suspended,
}

/// # Summary
/// 字段溯源记录：标记某个值来自有文档说明的降级规则，而非数据源原值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    // 被回填的 K 线时间
    pub time: DateTime<Utc>,
    // 被回填的字段
    pub field: BarField,
    // 值的来源字段
    pub source: BarField,
}

/// # Summary
/// 最新行情：一根 Bar 及其前收盘价的溯源。
///
/// # Invariants
/// - `provenance` 为 Some 时，`bar.prev_close` 是由开盘价回填的值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bar: Bar,
    pub provenance: Option<Provenance>,
}

impl Quote {
    /// 由数据源原始 Bar 构造，缺失的前收盘价以开盘价回填。
    pub fn from_bar(raw: &Bar) -> Self {
        let (bar, provenance) = raw.with_prev_close_fallback();
        Self { bar, provenance }
    }
}

/// # Summary
/// 数据源原始行被拒收的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    // 时间或收盘价无法解析
    UnparseableRequiredField,
    // 与前一行时间戳重复
    DuplicateTimestamp,
    // 违反 low <= {open, close} <= high
    InconsistentPriceRange,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnparseableRequiredField => write!(f, "unparseable-required-field"),
            RejectReason::DuplicateTimestamp => write!(f, "duplicate-timestamp"),
            RejectReason::InconsistentPriceRange => write!(f, "inconsistent-price-range"),
        }
    }
}

/// # Summary
/// 被拒收的原始行，供编排器转写为审计错误记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    // 数据源返回中的行序号
    pub index: usize,
    // 拒收原因
    pub reason: RejectReason,
    // 出问题的字段
    pub field: Option<BarField>,
    // 原始值摘要
    pub raw: String,
}

/// # Summary
/// 单一标的、单一粒度、单一复权方式下的有序 K 线序列。
///
/// # Invariants
/// - `bars` 时间戳严格递增且唯一。
/// - 每次请求新建，指标引擎只读，不做原地修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: Symbol,
    pub granularity: Granularity,
    pub adjustment: Adjustment,
    pub bars: Vec<Bar>,
    // 适配器在边界处拒收的原始行
    pub rejects: Vec<RejectedRow>,
}

impl Series {
    /// # Summary
    /// 由任意顺序的 K 线构造有序序列。
    ///
    /// # Logic
    /// 1. 按时间升序稳定排序。
    /// 2. 相同时间戳只保留首次出现者，其余记为 `DuplicateTimestamp` 拒收。
    ///
    /// # Arguments
    /// * `bars`: 适配器解析出的 K 线，顺序不限。
    /// * `rejects`: 解析阶段已产生的拒收记录。
    ///
    /// # Returns
    /// 满足严格递增不变量的 Series。
    pub fn from_unordered(
        symbol: Symbol,
        granularity: Granularity,
        adjustment: Adjustment,
        bars: Vec<Bar>,
        mut rejects: Vec<RejectedRow>,
    ) -> Self {
        let mut indexed: Vec<(usize, Bar)> = bars.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, bar)| bar.time);

        let mut ordered: Vec<Bar> = Vec::with_capacity(indexed.len());
        for (index, bar) in indexed {
            if ordered.last().is_some_and(|last| last.time == bar.time) {
                rejects.push(RejectedRow {
                    index,
                    reason: RejectReason::DuplicateTimestamp,
                    field: Some(BarField::Time),
                    raw: bar.time.to_rfc3339(),
                });
                continue;
            }
            ordered.push(bar);
        }

        Self {
            symbol,
            granularity,
            adjustment,
            bars: ordered,
            rejects,
        }
    }

    /// K 线数量。
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// 是否为空序列。
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// 检查时间戳严格递增不变量。
    pub fn is_strictly_ascending(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].time < w[1].time)
    }

    /// 只保留最近 `limit` 根，返回新序列。
    pub fn tail(&self, limit: usize) -> Series {
        let skip = self.bars.len().saturating_sub(limit);
        Series {
            bars: self.bars[skip..].to_vec(),
            ..self.clone()
        }
    }

    /// # Summary
    /// 对整条序列执行前收盘价回填（非破坏性）。
    ///
    /// # Returns
    /// (新序列, 每个被回填值的溯源记录)。原序列保持不变以供审计比对。
    pub fn with_prev_close_fallback(&self) -> (Series, Vec<Provenance>) {
        let mut notes = Vec::new();
        let bars = self
            .bars
            .iter()
            .map(|bar| {
                let (filled, note) = bar.with_prev_close_fallback();
                notes.extend(note);
                filled
            })
            .collect();
        (
            Series {
                bars,
                ..self.clone()
            },
            notes,
        )
    }
}

/// # Summary
/// 停牌状态，对应数据源的停牌天数字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionState {
    // 正常交易
    Trading,
    // 复牌首日
    Resumed,
    // 停牌中，附带已停牌天数
    Suspended { days: u32 },
}

/// # Summary
/// 证券基本资料。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub symbol: Symbol,
    // 证券全称
    pub name: Option<String>,
    // 上市日期
    pub listing_date: Option<NaiveDate>,
    // 前收盘价
    pub prev_close: Option<f64>,
    // 涨停价
    pub limit_up: Option<f64>,
    // 跌停价
    pub limit_down: Option<f64>,
    // 最小价格变动单位
    pub price_tick: Option<f64>,
    // 流通股本
    pub float_shares: Option<f64>,
    // 总股本
    pub total_shares: Option<f64>,
    pub suspension: SuspensionState,
}

/// # Summary
/// 单条资讯。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub date: DateTime<Utc>,
    pub title: String,
    pub summary: String,
}

/// # Summary
/// 资讯列表。
///
/// # Invariants
/// - 按日期从新到旧排列，长度不超过请求数量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewsFeed {
    pub items: Vec<NewsItem>,
}

impl NewsFeed {
    /// # Summary
    /// 由任意顺序的资讯构造有界列表。
    ///
    /// # Logic
    /// 1. 按日期降序稳定排序。
    /// 2. 截断至 `count` 条。
    pub fn most_recent(mut items: Vec<NewsItem>, count: usize) -> Self {
        items.sort_by(|a, b| b.date.cmp(&a.date));
        items.truncate(count);
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            time: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap(),
            open: Some(close),
            high: Some(close + 1.0),
            low: Some(close - 1.0),
            close: Some(close),
            volume: Some(100.0),
            turnover: None,
            prev_close: None,
            suspended: false,
        }
    }

    fn symbol() -> Symbol {
        Symbol::parse("600519.SH").unwrap()
    }

    #[test]
    fn test_from_unordered_sorts_and_dedups() {
        let bars = vec![bar(3, 3.0), bar(1, 1.0), bar(2, 2.0), bar(1, 9.0)];
        let series = Series::from_unordered(
            symbol(),
            Granularity::Day,
            Adjustment::None,
            bars,
            vec![],
        );
        assert!(series.is_strictly_ascending());
        let closes: Vec<_> = series.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(series.rejects.len(), 1);
        assert_eq!(series.rejects[0].reason, RejectReason::DuplicateTimestamp);
        assert_eq!(series.rejects[0].index, 3);
    }

    #[test]
    fn test_prev_close_fallback_is_non_mutating() {
        let mut with_pc = bar(2, 2.0);
        with_pc.prev_close = Some(1.5);
        let series = Series::from_unordered(
            symbol(),
            Granularity::Day,
            Adjustment::None,
            vec![bar(1, 1.0), with_pc],
            vec![],
        );

        let (filled, notes) = series.with_prev_close_fallback();

        assert_eq!(series.bars[0].prev_close, None);
        assert_eq!(filled.bars[0].prev_close, Some(1.0));
        assert_eq!(filled.bars[1].prev_close, Some(1.5));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].field, BarField::PrevClose);
        assert_eq!(notes[0].source, BarField::Open);
        assert_eq!(notes[0].time, series.bars[0].time);
    }

    #[test]
    fn test_quote_fills_prev_close_from_open() {
        let quote = Quote::from_bar(&bar(3, 10.0));
        assert_eq!(quote.bar.prev_close, Some(10.0));
        let note = quote.provenance.unwrap();
        assert_eq!(note.field, BarField::PrevClose);
        assert_eq!(note.time, quote.bar.time);

        let mut priced = bar(3, 10.0);
        priced.prev_close = Some(9.5);
        let quote = Quote::from_bar(&priced);
        assert_eq!(quote.bar.prev_close, Some(9.5));
        assert_eq!(quote.provenance, None);
    }

    #[test]
    fn test_consistency_check() {
        let mut b = bar(1, 10.0);
        assert!(b.is_consistent());
        b.close = Some(12.0);
        assert!(!b.is_consistent());
        b.suspended = true;
        assert!(b.is_consistent());
    }

    #[test]
    fn test_news_feed_bounded_most_recent_first() {
        let item = |day: u32| NewsItem {
            date: Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap(),
            title: format!("t{day}"),
            summary: String::new(),
        };
        let feed = NewsFeed::most_recent(vec![item(1), item(3), item(2)], 2);
        let titles: Vec<_> = feed.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["t3", "t2"]);
    }
}

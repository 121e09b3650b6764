use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use kxian_core::common::time::{TimeProvider, exchange_offset};
use kxian_core::common::{Adjustment, Granularity, InstrumentKind, Symbol};
use kxian_core::config::ProviderConfig;
use kxian_core::market::entity::{
    Bar, BarField, Profile, RejectReason, RejectedRow, Series, SuspensionState,
};
use kxian_core::market::error::MarketError;
use kxian_core::market::port::{MarketDataProvider, NewsStream};
use kxian_core::market::request::HistoryQuery;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// 单次区间查询的最大跨度
const MAX_RANGE_DAYS: i64 = 365;
// 拒收记录中保留的原始报文长度
const RAW_EXCERPT_LEN: usize = 200;

// 股票与指数目录接口
const STOCK_LIST_PATH: &str = "hs/list/all";
const INDEX_LIST_PATH: &str = "hz/list/hszs";

/// K 线字段表：数据源字段名 → 规范字段。
const BAR_FIELDS: [(&str, BarField); 9] = [
    ("t", BarField::Time),
    ("o", BarField::Open),
    ("h", BarField::High),
    ("l", BarField::Low),
    ("c", BarField::Close),
    ("pc", BarField::PrevClose),
    ("v", BarField::Volume),
    ("a", BarField::Turnover),
    ("sf", BarField::Suspended),
];

/// 实时行情字段表。
const QUOTE_FIELDS: [(&str, BarField); 8] = [
    ("t", BarField::Time),
    ("o", BarField::Open),
    ("h", BarField::High),
    ("l", BarField::Low),
    ("p", BarField::Close),
    ("yc", BarField::PrevClose),
    ("v", BarField::Volume),
    ("cje", BarField::Turnover),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileField {
    Name,
    ListingDate,
    PrevClose,
    LimitUp,
    LimitDown,
    PriceTick,
    FloatShares,
    TotalShares,
    Suspension,
}

/// 证券资料字段表。
const PROFILE_FIELDS: [(&str, ProfileField); 9] = [
    ("name", ProfileField::Name),
    ("od", ProfileField::ListingDate),
    ("pc", ProfileField::PrevClose),
    ("up", ProfileField::LimitUp),
    ("dp", ProfileField::LimitDown),
    ("pk", ProfileField::PriceTick),
    ("fv", ProfileField::FloatShares),
    ("tv", ProfileField::TotalShares),
    ("is", ProfileField::Suspension),
];

/// # Summary
/// 智兔数据（zhituapi）行情提供者实现。
///
/// # Invariants
/// - 使用 `reqwest` 异步客户端通讯，token 以查询参数传递且不出现在错误信息中。
/// - 数据源字段名只在本模块的字段表中出现。
/// - 不做重试，重试由编排器负责。
/// - 指数走 `hz/` 接口，个股走 `hs/` 接口。
#[derive(Clone)]
pub struct ZhituProvider {
    client: Client,
    base_url: String,
    token: String,
    // 区间查询缺省截止日取自该时钟
    clock: Arc<dyn TimeProvider>,
}

impl ZhituProvider {
    /// # Summary
    /// 创建一个新的 ZhituProvider 实例。
    ///
    /// # Logic
    /// 1. 安装 rustls 的 ring 加密后端（已安装时忽略）。
    /// 2. 按给定超时构建 reqwest 客户端。
    ///
    /// # Arguments
    /// * `base_url`: 接口根地址。
    /// * `token`: 访问令牌（不透明）。
    /// * `timeout`: 单次请求超时。
    /// * `clock`: 时钟。
    ///
    /// # Returns
    /// 成功返回实例；客户端构建失败返回 `UpstreamUnavailable`。
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, MarketError> {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            clock,
        })
    }

    /// 由配置段构造。
    pub fn from_config(
        config: &ProviderConfig,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, MarketError> {
        Self::new(
            config.base_url.clone(),
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
            clock,
        )
    }

    /// # Summary
    /// 发送 GET 请求并返回解析后的 JSON。
    ///
    /// # Logic
    /// 1. 附加 token 与额外查询参数。
    /// 2. 429 映射为 `RateLimited`，其它非成功状态与网络错误映射为 `UpstreamUnavailable`。
    /// 3. 响应体无法解析为 JSON 时返回 `MalformedPayload`。
    /// 4. 检查报文中的错误标记。
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, MarketError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(path, "zhitu request");

        let resp = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketError::UpstreamUnavailable(format!("timed out: {path}"))
                } else {
                    MarketError::UpstreamUnavailable(e.without_url().to_string())
                }
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(MarketError::UpstreamUnavailable(format!("HTTP {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| MarketError::MalformedPayload(e.without_url().to_string()))?;
        check_envelope(body)
    }
}

#[async_trait]
impl MarketDataProvider for ZhituProvider {
    fn name(&self) -> &str {
        "zhitu"
    }

    /// 指数没有资料接口，只返回目录中的名称。
    async fn fetch_profile(&self, symbol: &Symbol) -> Result<Profile, MarketError> {
        if symbol.kind() == InstrumentKind::Index {
            return Ok(index_profile(symbol));
        }
        let body = self
            .get_json(&format!("hs/instrument/{}", symbol.canonical()), &[])
            .await?;
        parse_profile(symbol, &body)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Bar, MarketError> {
        let body = self.get_json(&quote_path(symbol), &[]).await?;
        parse_quote(&body)
    }

    /// # Summary
    /// 获取历史 K 线。
    ///
    /// # Logic
    /// 1. 未指定日期范围时调用"近期"接口，否则调用区间接口。
    /// 2. 区间超过一年时截断为起始日起一年并告警。
    /// 3. 逐行翻译并收集拒收记录，排序去重后按 `limit` 保留最近的 K 线。
    /// 4. 指数不区分复权方式。
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        query: &HistoryQuery,
    ) -> Result<Series, MarketError> {
        if symbol.kind() == InstrumentKind::Index && query.adjustment != Adjustment::None {
            debug!(symbol = %symbol, adjustment = %query.adjustment, "index history ignores adjustment");
        }
        let range = history_range(query.start, query.end, self.clock.market_date());
        let path = history_path(symbol, query, range.is_some());
        let body = match range {
            None => self.get_json(&path, &[]).await?,
            Some((start, end)) => {
                let params = [
                    ("st", start.format("%Y%m%d").to_string()),
                    ("et", end.format("%Y%m%d").to_string()),
                ];
                self.get_json(&path, &params).await?
            }
        };

        let rows = body.as_array().ok_or_else(|| {
            MarketError::MalformedPayload(format!("expected bar array, got {}", kind_of(&body)))
        })?;
        let (bars, rejects) = parse_bars(rows);
        if !rejects.is_empty() {
            warn!(symbol = %symbol, rejected = rejects.len(), "zhitu rows rejected");
        }

        let series = Series::from_unordered(
            symbol.clone(),
            query.granularity,
            query.adjustment,
            bars,
            rejects,
        );
        Ok(match query.limit {
            Some(limit) => series.tail(limit),
            None => series,
        })
    }

    async fn fetch_news(&self, symbol: &Symbol, _count: usize) -> Result<NewsStream, MarketError> {
        // 该数据源没有资讯接口
        debug!(symbol = %symbol, "zhitu has no news endpoint");
        Ok(Box::pin(futures::stream::empty()))
    }

    /// # Summary
    /// 加载股票与指数目录。
    ///
    /// # Logic
    /// 两个目录任一加载失败即返回错误，由编排器决定是否沿用旧快照。
    async fn fetch_directory(&self) -> Result<Vec<Symbol>, MarketError> {
        let stocks = self.get_json(STOCK_LIST_PATH, &[]).await?;
        let indices = self.get_json(INDEX_LIST_PATH, &[]).await?;
        let mut listings = parse_listings(&stocks, InstrumentKind::Stock)?;
        listings.extend(parse_listings(&indices, InstrumentKind::Index)?);
        debug!(count = listings.len(), "zhitu directory loaded");
        Ok(listings)
    }
}

/// 实时行情接口：个股按纯代码，指数按完整代码。
fn quote_path(symbol: &Symbol) -> String {
    match symbol.kind() {
        InstrumentKind::Stock => format!("hs/real/ssjy/{}", symbol.code),
        InstrumentKind::Index => format!("hz/real/ssjy/{}", symbol.canonical()),
    }
}

/// 历史 K 线接口，`ranged` 为 true 时走区间接口。
fn history_path(symbol: &Symbol, query: &HistoryQuery, ranged: bool) -> String {
    let period = period_code(query.granularity);
    let dm = symbol.canonical();
    match (symbol.kind(), ranged) {
        (InstrumentKind::Stock, false) => {
            format!("hs/latest/{dm}/{period}/{}", adjust_code(query.adjustment))
        }
        (InstrumentKind::Stock, true) => {
            format!("hs/history/{dm}/{period}/{}", adjust_code(query.adjustment))
        }
        (InstrumentKind::Index, false) => format!("hz/latest/fsjy/{dm}/{period}"),
        (InstrumentKind::Index, true) => format!("hz/history/fsjy/{dm}/{period}"),
    }
}

fn period_code(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Minute1 => "1",
        Granularity::Minute5 => "5",
        Granularity::Minute15 => "15",
        Granularity::Minute30 => "30",
        Granularity::Minute60 => "60",
        Granularity::Day => "d",
        Granularity::Week => "w",
        Granularity::Month => "m",
        Granularity::Year => "y",
    }
}

fn adjust_code(adjustment: Adjustment) -> &'static str {
    match adjustment {
        Adjustment::None => "n",
        Adjustment::Forward => "f",
        Adjustment::Backward => "b",
        Adjustment::RatioForward => "fr",
        Adjustment::RatioBackward => "br",
    }
}

/// # Summary
/// 计算区间查询的起止日期。
///
/// # Logic
/// 1. 两端均未指定时返回 None（走近期接口）。
/// 2. 缺失的一端：截止日默认今天，起始日默认截止日前一年。
/// 3. 跨度超过一年时截止日截断为起始日 + 365 天。
/// 4. 日期运算在日历上下限处饱和。
fn history_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    if start.is_none() && end.is_none() {
        return None;
    }
    let max_span = TimeDelta::days(MAX_RANGE_DAYS);
    let end = end.unwrap_or(today);
    let start = start.unwrap_or_else(|| end.checked_sub_signed(max_span).unwrap_or(NaiveDate::MIN));
    if end.signed_duration_since(start) > max_span {
        let truncated = start.checked_add_signed(max_span).unwrap_or(NaiveDate::MAX);
        warn!(%start, %end, %truncated, "history range exceeds one year, truncated");
        return Some((start, truncated));
    }
    Some((start, end))
}

/// # Summary
/// 检查响应报文的错误标记。
///
/// # Logic
/// 数组直接通过；对象中仅有 `msg`/`message`/`error` 说明字段时视为错误报文，
/// 含"频繁"或"limit"字样的归为限流，其余归为报文异常。
fn check_envelope(body: Value) -> Result<Value, MarketError> {
    let Some(obj) = body.as_object() else {
        return Ok(body);
    };
    let marker = ["msg", "message", "error"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str));
    match marker {
        Some(message) if obj.len() <= 2 => {
            let lowered = message.to_lowercase();
            if lowered.contains("limit") || message.contains("频繁") {
                Err(MarketError::RateLimited(message.to_string()))
            } else {
                Err(MarketError::MalformedPayload(message.to_string()))
            }
        }
        _ => Ok(body),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lookup<'a, F: Copy + PartialEq>(
    row: &'a Map<String, Value>,
    table: &[(&'static str, F)],
    wanted: F,
) -> Option<&'a Value> {
    table
        .iter()
        .find(|(_, field)| *field == wanted)
        .and_then(|(key, _)| row.get(*key))
}

/// 数值或数字字符串 → f64；空值、空串、非有限值与无法解析者为 None。
fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// # Summary
/// 解析数据源时间（北京时间）为 UTC。
///
/// # Logic
/// 依次尝试 `yyyy-MM-dd HH:mm:ss`、`yyyy-MM-dd HH:mm`、`yyyy-MM-dd`、`yyyyMMdd`，
/// 仅日期的格式取当日零点。
fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?.trim();
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    naive
        .and_local_timezone(exchange_offset())
        .single()
        .map(|t| t.with_timezone(&Utc))
}

fn excerpt(value: &Value) -> String {
    value.to_string().chars().take(RAW_EXCERPT_LEN).collect()
}

/// # Summary
/// 按字段表把一行原始报文翻译为 Bar。
///
/// # Logic
/// 1. 时间无法解析：拒收。
/// 2. 收盘价缺失且未停牌，或收盘价存在但无法解析：拒收。
/// 3. 其余数值字段解析失败降级为 None。
/// 4. 非停牌 K 线价格区间不一致：拒收。
fn parse_bar(
    index: usize,
    row: &Value,
    table: &[(&'static str, BarField)],
) -> Result<Bar, RejectedRow> {
    let reject = |reason: RejectReason, field: Option<BarField>| RejectedRow {
        index,
        reason,
        field,
        raw: excerpt(row),
    };
    let Some(obj) = row.as_object() else {
        return Err(reject(RejectReason::UnparseableRequiredField, None));
    };
    let get = |field: BarField| lookup(obj, table, field);

    let time = timestamp(get(BarField::Time)).ok_or_else(|| {
        reject(RejectReason::UnparseableRequiredField, Some(BarField::Time))
    })?;
    let suspended = integer(get(BarField::Suspended)).is_some_and(|flag| flag > 0);

    let raw_close = get(BarField::Close);
    let close = number(raw_close);
    if close.is_none() && !(suspended && is_blank(raw_close)) {
        return Err(reject(
            RejectReason::UnparseableRequiredField,
            Some(BarField::Close),
        ));
    }

    let bar = Bar {
        time,
        open: number(get(BarField::Open)),
        high: number(get(BarField::High)),
        low: number(get(BarField::Low)),
        close,
        volume: number(get(BarField::Volume)),
        turnover: number(get(BarField::Turnover)),
        prev_close: number(get(BarField::PrevClose)),
        suspended,
    };
    if !bar.is_consistent() {
        return Err(reject(RejectReason::InconsistentPriceRange, None));
    }
    Ok(bar)
}

/// 翻译 K 线数组，返回 (有效 K 线, 拒收记录)。
fn parse_bars(rows: &[Value]) -> (Vec<Bar>, Vec<RejectedRow>) {
    let mut bars = Vec::with_capacity(rows.len());
    let mut rejects = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match parse_bar(index, row, &BAR_FIELDS) {
            Ok(bar) => bars.push(bar),
            Err(rejected) => rejects.push(rejected),
        }
    }
    (bars, rejects)
}

/// 翻译实时行情。接口偶尔以单元素数组返回，取第一个元素。
fn parse_quote(body: &Value) -> Result<Bar, MarketError> {
    let row = match body {
        Value::Array(items) => items.first().ok_or_else(|| {
            MarketError::MalformedPayload("empty quote array".to_string())
        })?,
        other => other,
    };
    parse_bar(0, row, &QUOTE_FIELDS).map_err(|rejected| {
        MarketError::MalformedPayload(format!(
            "quote {}: {}",
            rejected.reason,
            rejected.field.map(|f| format!("{f:?}")).unwrap_or_default()
        ))
    })
}

/// # Summary
/// 翻译目录报文。
///
/// # Logic
/// 1. 每行取 `dm`（如 `000001.SZ`）与 `mc`（名称）。
/// 2. 代码无法解析，或代码段与所在目录的品种不符的行跳过。
fn parse_listings(body: &Value, kind: InstrumentKind) -> Result<Vec<Symbol>, MarketError> {
    let rows = body.as_array().ok_or_else(|| {
        MarketError::MalformedPayload(format!("expected listing array, got {}", kind_of(body)))
    })?;
    let listings: Vec<Symbol> = rows
        .iter()
        .filter_map(|row| {
            let symbol = Symbol::parse(row.get("dm")?.as_str()?).ok()?;
            if symbol.kind() != kind {
                return None;
            }
            Some(match row.get("mc").and_then(Value::as_str).map(str::trim) {
                Some(name) if !name.is_empty() => symbol.with_name(name),
                _ => symbol,
            })
        })
        .collect();
    let skipped = rows.len().saturating_sub(listings.len());
    if skipped > 0 {
        debug!(?kind, skipped, "zhitu listing rows skipped");
    }
    Ok(listings)
}

/// 指数资料：只有目录中的名称。
fn index_profile(symbol: &Symbol) -> Profile {
    Profile {
        symbol: symbol.clone(),
        name: symbol.name.clone(),
        listing_date: None,
        prev_close: None,
        limit_up: None,
        limit_down: None,
        price_tick: None,
        float_shares: None,
        total_shares: None,
        suspension: SuspensionState::Trading,
    }
}

/// # Summary
/// 翻译证券资料。
///
/// # Logic
/// 停牌字段：大于 0 为停牌天数，-1 为复牌，其余为正常交易。
fn parse_profile(symbol: &Symbol, body: &Value) -> Result<Profile, MarketError> {
    let obj = body.as_object().ok_or_else(|| {
        MarketError::MalformedPayload(format!("expected profile object, got {}", kind_of(body)))
    })?;
    let get = |field: ProfileField| lookup(obj, &PROFILE_FIELDS, field);

    let name = get(ProfileField::Name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let listing_date = get(ProfileField::ListingDate)
        .and_then(Value::as_str)
        .and_then(|s| {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
                .ok()
        });
    let suspension = match integer(get(ProfileField::Suspension)) {
        Some(days) if days > 0 => SuspensionState::Suspended {
            days: u32::try_from(days).unwrap_or(u32::MAX),
        },
        Some(-1) => SuspensionState::Resumed,
        _ => SuspensionState::Trading,
    };

    Ok(Profile {
        symbol: match &name {
            Some(name) => symbol.with_name(name.clone()),
            None => symbol.clone(),
        },
        name,
        listing_date,
        prev_close: number(get(ProfileField::PrevClose)),
        limit_up: number(get(ProfileField::LimitUp)),
        limit_down: number(get(ProfileField::LimitDown)),
        price_tick: number(get(ProfileField::PriceTick)),
        float_shares: number(get(ProfileField::FloatShares)),
        total_shares: number(get(ProfileField::TotalShares)),
        suspension,
    })
}

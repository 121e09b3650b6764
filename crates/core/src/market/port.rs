use crate::common::Symbol;
use crate::market::entity::{Bar, NewsItem, Profile, Series};
use crate::market::error::MarketError;
use crate::market::request::{DataRequest, Dataset, HistoryQuery};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// # Summary
/// 资讯流别名：有限、只能消费一次，不可重启。
pub type NewsStream = Pin<Box<dyn Stream<Item = NewsItem> + Send>>;

/// # Summary
/// 行情数据提供者接口（上游数据源适配器）。
///
/// # Invariants
/// - 数据源特有字段名必须在适配器边界内翻译为规范结构，不得外泄。
/// - 适配器自身不重试；超时与非成功响应返回 `UpstreamUnavailable`，限流返回 `RateLimited`。
/// - 新增数据源只需新增实现，编排器与指标引擎不按数据源分支。
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 数据源名称，写入审计参数。
    fn name(&self) -> &str;

    /// # Summary
    /// 获取证券基本资料。
    ///
    /// # Arguments
    /// * `symbol`: 规范化后的标的。
    ///
    /// # Returns
    /// 成功返回 Profile。
    async fn fetch_profile(&self, symbol: &Symbol) -> Result<Profile, MarketError>;

    /// # Summary
    /// 获取最新实时行情，折算为一根 Bar。
    ///
    /// # Arguments
    /// * `symbol`: 规范化后的标的。
    ///
    /// # Returns
    /// 成功返回最新 Bar。
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Bar, MarketError>;

    /// # Summary
    /// 获取历史 K 线序列。
    ///
    /// # Logic
    /// 1. 按粒度、复权方式与时间范围构建数据源请求。
    /// 2. 逐字段翻译原始报文，单字段解析失败降级为 None。
    /// 3. 时间或收盘价无法解析的行丢弃并记入 `Series::rejects`。
    /// 4. 升序排序后返回。
    ///
    /// # Arguments
    /// * `symbol`: 规范化后的标的。
    /// * `query`: 查询参数。
    ///
    /// # Returns
    /// 成功返回升序 Series。
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        query: &HistoryQuery,
    ) -> Result<Series, MarketError>;

    /// # Summary
    /// 获取资讯流。
    ///
    /// # Arguments
    /// * `symbol`: 规范化后的标的。
    /// * `count`: 需要的条数上限。
    ///
    /// # Returns
    /// 成功返回有限资讯流。
    async fn fetch_news(&self, symbol: &Symbol, count: usize) -> Result<NewsStream, MarketError>;

    /// # Summary
    /// 获取数据源的证券目录（股票与指数）。
    ///
    /// # Logic
    /// 默认实现返回空目录，表示该数据源不提供目录，编排器据此跳过上市校验。
    ///
    /// # Returns
    /// 成功返回带名称的标的列表。
    async fn fetch_directory(&self) -> Result<Vec<Symbol>, MarketError> {
        Ok(Vec::new())
    }
}

/// # Summary
/// 行情编排服务契约，供展示层调用。
///
/// # Invariants
/// - 非法代码在任何网络请求之前失败。
/// - 同一参数在缓存有效期内重复调用不会增加上游调用次数。
#[async_trait]
pub trait MarketData: Send + Sync {
    /// # Summary
    /// 获取一份指标增强的数据集。
    ///
    /// # Arguments
    /// * `request`: 请求参数。
    ///
    /// # Returns
    /// 部分模式下返回带分区状态的数据集；全有或全无模式下任一分区失败即返回错误。
    async fn get(&self, request: DataRequest) -> Result<Dataset, MarketError>;
}

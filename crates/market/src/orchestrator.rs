use crate::directory::SymbolDirectory;
use crate::retry::with_retry;
use async_trait::async_trait;
use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use kxian_audit::logger::AuditLogger;
use kxian_core::audit::entity::{AuditKind, AuditRecord};
use kxian_core::cache::entity::{CacheKey, CacheOrigin, RequestKind};
use kxian_core::cache::port::Cache;
use kxian_core::common::Symbol;
use kxian_core::common::time::TimeProvider;
use kxian_core::config::{AppConfig, CacheConfig, RetryConfig};
use kxian_core::indicator::entity::{Caveat, EnrichedSeries, IndicatorConfig};
use kxian_core::market::entity::{Bar, NewsFeed, NewsItem, Profile, Quote, Series};
use kxian_core::market::error::MarketError;
use kxian_core::market::port::{MarketData, MarketDataProvider};
use kxian_core::market::request::{DataRequest, Dataset, RequestMode, Section};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// # Summary
/// 缓存中保存的各类请求结果。
///
/// # Invariants
/// - 变体与 `CacheKey::kind` 一一对应，历史数据以指标增强后的形式保存。
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Profile(Profile),
    Quote(Quote),
    History(EnrichedSeries),
    News(NewsFeed),
}

fn mismatch(expected: &str) -> MarketError {
    MarketError::MalformedPayload(format!("cache entry is not a {expected}"))
}

impl Payload {
    fn into_profile(self) -> Result<Profile, MarketError> {
        match self {
            Payload::Profile(profile) => Ok(profile),
            _ => Err(mismatch("profile")),
        }
    }

    fn into_quote(self) -> Result<Quote, MarketError> {
        match self {
            Payload::Quote(quote) => Ok(quote),
            _ => Err(mismatch("quote")),
        }
    }

    fn into_history(self) -> Result<EnrichedSeries, MarketError> {
        match self {
            Payload::History(series) => Ok(series),
            _ => Err(mismatch("history")),
        }
    }

    fn into_news(self) -> Result<NewsFeed, MarketError> {
        match self {
            Payload::News(feed) => Ok(feed),
            _ => Err(mismatch("news")),
        }
    }
}

/// 编排器使用的缓存类型。
pub type PayloadCache = dyn Cache<CacheKey, Payload, MarketError>;

/// 上游结果写入审计记录时的行数与关键字段。
trait Audited {
    fn rows(&self) -> usize;

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        record
    }
}

impl Audited for Profile {
    fn rows(&self) -> usize {
        1
    }

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        let record = record.summary("suspension", format!("{:?}", self.suspension));
        match self.prev_close {
            Some(prev_close) => record.summary("prev_close", prev_close),
            None => record,
        }
    }
}

impl Audited for Bar {
    fn rows(&self) -> usize {
        1
    }

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        let record = record.summary("time", self.time.to_rfc3339());
        match self.close {
            Some(close) => record.summary("close", close),
            None => record,
        }
    }
}

impl Audited for Series {
    fn rows(&self) -> usize {
        self.len()
    }

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        let mut record = record.summary("rejected", self.rejects.len());
        if let Some(first) = self.bars.first() {
            record = record.summary("first", first.time.to_rfc3339());
        }
        if let Some(last) = self.bars.last() {
            record = record.summary("last", last.time.to_rfc3339());
            if let Some(close) = last.close {
                record = record.summary("last_close", close);
            }
        }
        record
    }
}

impl Audited for Quote {
    fn rows(&self) -> usize {
        self.bar.rows()
    }

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        let record = self.bar.summarize(record);
        match &self.provenance {
            Some(note) => record.summary("filled", format!("{:?}<-{:?}", note.field, note.source)),
            None => record,
        }
    }
}

impl Audited for Vec<NewsItem> {
    fn rows(&self) -> usize {
        self.len()
    }
}

impl Audited for Vec<Symbol> {
    fn rows(&self) -> usize {
        self.len()
    }
}

impl Audited for Payload {
    fn rows(&self) -> usize {
        match self {
            Payload::Profile(profile) => profile.rows(),
            Payload::Quote(quote) => quote.rows(),
            Payload::History(enriched) => enriched.series.rows(),
            Payload::News(feed) => feed.items.rows(),
        }
    }

    fn summarize(&self, record: AuditRecord) -> AuditRecord {
        match self {
            Payload::Profile(profile) => profile.summarize(record),
            Payload::Quote(quote) => quote.summarize(record),
            Payload::History(enriched) => enriched
                .series
                .summarize(record)
                .summary("caveats", enriched.caveats.len()),
            Payload::News(feed) => feed.items.summarize(record),
        }
    }
}

/// 审计记录的归属。
#[derive(Clone, Copy)]
enum Subject<'a> {
    Key(&'a CacheKey),
    // 目录加载由某个请求的标的触发
    Directory(&'a Symbol),
}

/// # Summary
/// 每类请求的缓存有效期。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub profile: Duration,
    pub quote: Duration,
    pub history: Duration,
    pub news: Duration,
    pub directory: Duration,
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            profile: Duration::from_secs(config.profile_ttl_secs),
            quote: Duration::from_secs(config.quote_ttl_secs),
            history: Duration::from_secs(config.history_ttl_secs),
            news: Duration::from_secs(config.news_ttl_secs),
            directory: Duration::from_secs(config.directory_ttl_secs),
        }
    }
}

/// # Summary
/// 编排器的运行参数。
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub ttl: TtlPolicy,
    pub retry: RetryConfig,
    // 请求未指定超时时使用
    pub request_timeout: Duration,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            ttl: TtlPolicy::from(&config.cache),
            retry: config.retry.clone(),
            request_timeout: Duration::from_secs(config.request.timeout_secs),
        }
    }
}

/// # Summary
/// `MarketData` 的具体实现：组合数据源、缓存、指标引擎与审计日志。
///
/// # Invariants
/// - 非法代码在任何缓存或网络访问之前失败，并写一条审计错误记录。
/// - 未在证券目录中的代码在任何行情抓取之前以 `InvalidSymbol` 失败。
/// - 每次上游尝试、每次缓存命中或共享都对应一条审计记录。
/// - 指标在历史数据到达后计算，结果连同序列一起缓存。
/// - 整个请求共用一个截止时间，超时的分区标记为 `TimedOut`。
pub struct Orchestrator {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<PayloadCache>,
    audit: Arc<AuditLogger>,
    clock: Arc<dyn TimeProvider>,
    directory: SymbolDirectory,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<PayloadCache>,
        audit: Arc<AuditLogger>,
        clock: Arc<dyn TimeProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        let directory = SymbolDirectory::new(settings.ttl.directory, clock.clone());
        Self {
            provider,
            cache,
            audit,
            clock,
            directory,
            settings,
        }
    }

    fn stamp(&self, kind: AuditKind, subject: Subject<'_>) -> AuditRecord {
        let record = match subject {
            Subject::Key(key) => AuditRecord::new(
                self.clock.now(),
                kind,
                key.kind.to_string(),
                key.symbol.canonical(),
            )
            .param("key", key),
            Subject::Directory(symbol) => AuditRecord::new(
                self.clock.now(),
                kind,
                RequestKind::Directory.to_string(),
                symbol.canonical(),
            ),
        };
        record.param("provider", self.provider.name())
    }

    fn record(&self, kind: AuditKind, key: &CacheKey) -> AuditRecord {
        self.stamp(kind, Subject::Key(key))
    }

    /// # Summary
    /// 执行一次上游尝试并写审计记录。
    ///
    /// # Logic
    /// 1. 成功：写 `Fetch` 记录，含尝试序号、已重试次数、行数与摘要。
    /// 2. 失败：写 `Error` 记录，含尝试序号与错误种类。
    async fn attempt<T, Fut>(
        &self,
        subject: Subject<'_>,
        attempt: u32,
        call: Fut,
    ) -> Result<T, MarketError>
    where
        T: Audited,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        let result = call.await;
        let record = match &result {
            Ok(value) => value.summarize(
                self.stamp(AuditKind::Fetch, subject)
                    .origin(CacheOrigin::Computed)
                    .attempt(attempt)
                    .retries(attempt.saturating_sub(1))
                    .rows(value.rows()),
            ),
            Err(error) => self
                .stamp(AuditKind::Error, subject)
                .origin(CacheOrigin::Computed)
                .attempt(attempt)
                .failure(error.kind(), error.to_string()),
        };
        self.audit.emit(record);
        result
    }

    async fn fetch<T, F, Fut>(&self, subject: Subject<'_>, call: F) -> Result<T, MarketError>
    where
        T: Audited,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        with_retry(&self.settings.retry, move |n| self.attempt(subject, n, call())).await
    }

    /// # Summary
    /// 在证券目录中确认标的已上市。
    ///
    /// # Logic
    /// 目录快照过期时经重试加载一次，加载过程与普通抓取一样写审计记录。
    async fn listed(&self, symbol: &Symbol) -> Result<Symbol, MarketError> {
        self.directory
            .resolve(symbol, move || {
                self.fetch(Subject::Directory(symbol), move || {
                    self.provider.fetch_directory()
                })
            })
            .await
    }

    /// 拒绝请求：告警并写一条 `request` 审计错误记录。
    fn reject(&self, raw: &str, error: MarketError) -> MarketError {
        warn!(symbol = %raw, "Rejected request: {}", error);
        self.audit.emit(
            AuditRecord::new(self.clock.now(), AuditKind::Error, "request", raw.trim())
                .failure(error.kind(), error.to_string()),
        );
        error
    }

    /// # Summary
    /// 通过缓存取得结果。
    ///
    /// # Logic
    /// 1. 交给缓存执行单飞读取，生产者只在未命中时被 poll。
    /// 2. 结果来自命中或共享时补写一条带来源标记的审计记录，行数与摘要同上游记录。
    async fn resolve(
        &self,
        key: CacheKey,
        ttl: Duration,
        producer: BoxFuture<'_, Result<Payload, MarketError>>,
    ) -> Result<Payload, MarketError> {
        let cached = self.cache.get_or_compute(key.clone(), ttl, producer).await;
        if cached.origin != CacheOrigin::Computed {
            debug!(key = %key, origin = %cached.origin, "Served from cache");
            let record = match &cached.result {
                Ok(payload) => {
                    payload.summarize(self.record(AuditKind::Fetch, &key).rows(payload.rows()))
                }
                Err(error) => self
                    .record(AuditKind::Error, &key)
                    .failure(error.kind(), error.to_string()),
            };
            self.audit.emit(record.origin(cached.origin));
        }
        cached.result
    }

    async fn profile(&self, symbol: &Symbol) -> Result<Profile, MarketError> {
        let key = CacheKey::profile(symbol);
        let producer = async {
            self.fetch(Subject::Key(&key), move || self.provider.fetch_profile(symbol))
                .await
                .map(Payload::Profile)
        }
        .boxed();
        self.resolve(key.clone(), self.settings.ttl.profile, producer)
            .await?
            .into_profile()
    }

    /// 最新行情；缺失的前收盘价以开盘价回填并记录溯源。
    async fn quote(&self, symbol: &Symbol) -> Result<Quote, MarketError> {
        let key = CacheKey::quote(symbol);
        let producer = async {
            self.fetch(Subject::Key(&key), move || self.provider.fetch_quote(symbol))
                .await
                .map(|bar: Bar| Payload::Quote(Quote::from_bar(&bar)))
        }
        .boxed();
        self.resolve(key.clone(), self.settings.ttl.quote, producer)
            .await?
            .into_quote()
    }

    async fn history(
        &self,
        symbol: &Symbol,
        request: &DataRequest,
    ) -> Result<EnrichedSeries, MarketError> {
        let query = request.history_query();
        let fingerprint = request.indicators.fingerprint();
        let key = CacheKey::history(symbol, &query, &fingerprint);
        let producer = async {
            let query = &query;
            let series = self
                .fetch(Subject::Key(&key), move || {
                    self.provider.fetch_history(symbol, query)
                })
                .await?;
            Ok(Payload::History(self.enrich(
                &key,
                series,
                &request.indicators,
                fingerprint.clone(),
            )))
        }
        .boxed();
        self.resolve(key.clone(), self.settings.ttl.history, producer)
            .await?
            .into_history()
    }

    async fn news(&self, symbol: &Symbol, count: usize) -> Result<NewsFeed, MarketError> {
        let key = CacheKey::news(symbol, count);
        let producer = async {
            self.fetch(Subject::Key(&key), move || async move {
                let stream = self.provider.fetch_news(symbol, count).await?;
                Ok(stream.take(count).collect::<Vec<NewsItem>>().await)
            })
            .await
            .map(|items| Payload::News(NewsFeed::most_recent(items, count)))
        }
        .boxed();
        self.resolve(key.clone(), self.settings.ttl.news, producer)
            .await?
            .into_news()
    }

    /// # Summary
    /// 对新抓取的历史序列执行降级回填与指标计算。
    ///
    /// # Logic
    /// 1. 适配器拒收的每一行写一条 `Error` 审计记录。
    /// 2. 缺失的前收盘价以开盘价回填，并保留溯源记录。
    /// 3. 计算指标并收集长度不足、拒收行等附注。
    /// 4. 写一条 `Compute` 审计记录。
    fn enrich(
        &self,
        key: &CacheKey,
        series: Series,
        config: &IndicatorConfig,
        fingerprint: String,
    ) -> EnrichedSeries {
        for reject in &series.rejects {
            let mut record = self
                .record(AuditKind::Error, key)
                .param("row", reject.index)
                .summary("raw", &reject.raw)
                .failure(reject.reason.to_string(), format!("row {} rejected", reject.index));
            if let Some(field) = reject.field {
                record = record.param("field", format!("{field:?}"));
            }
            self.audit.emit(record);
        }

        let (filled, provenance) = series.with_prev_close_fallback();
        let indicators = kxian_indicator::compute(&filled, config);
        let mut caveats = kxian_indicator::shortfalls(&filled, config);
        if !filled.rejects.is_empty() {
            caveats.push(Caveat::RejectedRows {
                count: filled.rejects.len(),
            });
        }

        let mut record = AuditRecord::new(
            self.clock.now(),
            AuditKind::Compute,
            "indicators",
            key.symbol.canonical(),
        )
        .param("fingerprint", &fingerprint)
        .param("key", key)
        .rows(filled.len())
        .summary("filled", provenance.len())
        .summary("caveats", caveats.len());
        if let Some(last) = indicators.rsi.last().copied().flatten() {
            record = record.summary("rsi_last", last);
        }
        self.audit.emit(record);

        if !caveats.is_empty() {
            debug!(key = %key, caveats = caveats.len(), "Enriched series carries caveats");
        }
        let complete = caveats.is_empty();
        EnrichedSeries {
            series: filled,
            indicators,
            config_fingerprint: fingerprint,
            provenance,
            caveats,
            complete,
        }
    }
}

/// 在截止时间内驱动一个分区；未请求的分区不会被 poll。
async fn bounded<T, Fut>(deadline: Instant, requested: bool, section: Fut) -> Section<T>
where
    Fut: Future<Output = Result<T, MarketError>>,
{
    if !requested {
        return Section::NotRequested;
    }
    match timeout_at(deadline, section).await {
        Ok(Ok(value)) => Section::Ready(value),
        Ok(Err(error)) => Section::Failed(error),
        Err(_) => Section::TimedOut,
    }
}

fn shortfall<T>(section: &Section<T>) -> Option<MarketError> {
    match section {
        Section::Failed(error) => Some(error.clone()),
        Section::TimedOut => Some(MarketError::UpstreamUnavailable(
            "request timed out".to_string(),
        )),
        Section::Ready(_) | Section::NotRequested => None,
    }
}

#[async_trait]
impl MarketData for Orchestrator {
    /// # Summary
    /// 获取一份指标增强的数据集。
    ///
    /// # Logic
    /// 1. 规范化代码，非法时写审计错误记录并立即返回。
    /// 2. 在截止时间内查证券目录，未上市或目录不可用时同样拒绝请求。
    /// 3. 以同一截止时间并发抓取各请求分区。
    /// 4. 全有或全无模式下，任一分区失败或超时即返回错误。
    /// 5. 汇总完整性标记。
    ///
    /// # Arguments
    /// * `request`: 请求参数。
    ///
    /// # Returns
    /// 按分区标注状态的数据集。
    async fn get(&self, request: DataRequest) -> Result<Dataset, MarketError> {
        let parsed = match Symbol::parse(&request.symbol) {
            Ok(symbol) => symbol,
            Err(error) => return Err(self.reject(&request.symbol, error)),
        };

        let timeout = request.timeout.unwrap_or(self.settings.request_timeout);
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or(now + Duration::from_secs(365 * 86_400));

        let symbol = match timeout_at(deadline, self.listed(&parsed)).await {
            Ok(Ok(symbol)) => symbol,
            Ok(Err(error)) => return Err(self.reject(&request.symbol, error)),
            Err(_) => {
                let error = MarketError::UpstreamUnavailable("request timed out".to_string());
                return Err(self.reject(&request.symbol, error));
            }
        };
        let sections = request.sections;
        let (profile, quote, history, news) = tokio::join!(
            bounded(deadline, sections.profile, self.profile(&symbol)),
            bounded(deadline, sections.quote, self.quote(&symbol)),
            bounded(deadline, sections.history, self.history(&symbol, &request)),
            bounded(
                deadline,
                sections.news.is_some(),
                self.news(&symbol, sections.news.unwrap_or(0)),
            ),
        );

        if request.mode == RequestMode::AllOrNothing {
            let failure = shortfall(&profile)
                .or_else(|| shortfall(&quote))
                .or_else(|| shortfall(&history))
                .or_else(|| shortfall(&news));
            if let Some(error) = failure {
                warn!(symbol = %symbol, "All-or-nothing request failed: {}", error);
                return Err(error);
            }
        }

        let complete = !profile.is_missing()
            && !quote.is_missing()
            && !news.is_missing()
            && match &history {
                Section::Ready(series) => series.complete,
                Section::NotRequested => true,
                Section::Failed(_) | Section::TimedOut => false,
            };
        info!(symbol = %symbol, complete, "Dataset assembled");

        Ok(Dataset {
            symbol,
            profile,
            quote,
            history,
            news,
            complete,
        })
    }
}

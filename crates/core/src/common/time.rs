use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeDelta, Utc};
use std::sync::RwLock;

// 沪深北交易所统一使用北京时间 (UTC+8)，无夏令时
const EXCHANGE_OFFSET_SECS: i32 = 8 * 3600;

/// 交易所所在时区。
pub fn exchange_offset() -> FixedOffset {
    FixedOffset::east_opt(EXCHANGE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// # Summary
/// 时钟接口。
/// 缓存过期判定、审计时间戳与区间查询的默认日期都从这里取当前时间。
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// 交易所当地的自然日。UTC 16:00 之后已是次日。
    fn market_date(&self) -> NaiveDate {
        self.now().with_timezone(&exchange_offset()).date_naive()
    }
}

/// 系统时钟。
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// # Summary
/// 手动拨动的时钟，测试里用来让缓存条目过期。
///
/// # Invariants
/// - 时间只在 `set` / `advance` 时变化，可跨线程共享。
pub struct ManualClock {
    current: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += delta;
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

pub mod time;

use crate::market::error::MarketError;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// # Summary
/// 交易所枚举，覆盖沪深京三市。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Exchange {
    // 上海证券交易所
    SH,
    // 深圳证券交易所
    SZ,
    // 北京证券交易所
    BJ,
}

impl Exchange {
    /// # Summary
    /// 根据 6 位证券代码首位推断所属交易所。
    ///
    /// # Logic
    /// 1. `6`/`9` 开头归属上交所。
    /// 2. `0`/`2`/`3` 开头归属深交所。
    /// 3. `4`/`8` 开头归属北交所。
    ///
    /// # Arguments
    /// * `code`: 已校验的 6 位数字代码。
    ///
    /// # Returns
    /// 无法推断时返回 None。
    fn infer(code: &str) -> Option<Self> {
        match code.as_bytes().first()? {
            b'6' | b'9' => Some(Exchange::SH),
            b'0' | b'2' | b'3' => Some(Exchange::SZ),
            b'4' | b'8' => Some(Exchange::BJ),
            _ => None,
        }
    }
}

impl FromStr for Exchange {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SH" | "SS" => Ok(Exchange::SH),
            "SZ" => Ok(Exchange::SZ),
            "BJ" => Ok(Exchange::BJ),
            other => Err(MarketError::InvalidSymbol(format!(
                "unknown exchange: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::SH => write!(f, "SH"),
            Exchange::SZ => write!(f, "SZ"),
            Exchange::BJ => write!(f, "BJ"),
        }
    }
}

/// # Summary
/// 标的品种。数据源对个股与指数使用不同的接口族。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Stock,
    Index,
}

/// # Summary
/// 证券标的实体，代表系统关注的特定股票或指数。
///
/// # Invariants
/// - `exchange` + `code` 唯一确定一个标的，`name` 不参与相等性与哈希。
/// - 规范化（大写、后缀约定）只在 `parse` 入口执行一次，之后不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    // 交易所
    pub exchange: Exchange,
    // 6 位证券代码 (例如: 600519)
    pub code: String,
    // 展示名称 (可选，例如: 贵州茅台)
    pub name: Option<String>,
}

impl Symbol {
    /// # Summary
    /// 将用户输入的各种代码写法规范化为 Symbol。
    ///
    /// # Logic
    /// 1. 去除首尾空白并统一大写。
    /// 2. 识别 `600519.SH` 后缀式与 `SH600519` 前缀式。
    /// 3. 裸代码按首位数字推断交易所。
    /// 4. 校验代码为 6 位 ASCII 数字。
    ///
    /// # Arguments
    /// * `raw`: 原始输入。
    ///
    /// # Returns
    /// 成功返回 Symbol，格式非法返回 `MarketError::InvalidSymbol`（不发起任何网络请求）。
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let upper = raw.trim().to_uppercase();
        let invalid = || MarketError::InvalidSymbol(raw.trim().to_string());

        let (code, exchange) = if let Some((code, suffix)) = upper.split_once('.') {
            (code.to_string(), Some(suffix.parse::<Exchange>()?))
        } else if upper.len() == 8 && upper.is_char_boundary(2) {
            let (prefix, code) = upper.split_at(2);
            (code.to_string(), Some(prefix.parse::<Exchange>()?))
        } else {
            (upper.clone(), None)
        };

        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let exchange = match exchange {
            Some(exchange) => exchange,
            None => Exchange::infer(&code).ok_or_else(invalid)?,
        };

        Ok(Self {
            exchange,
            code,
            name: None,
        })
    }

    /// 附加展示名称，返回新的 Symbol。
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self.clone()
        }
    }

    /// # Summary
    /// 按交易所代码段判断品种。
    ///
    /// # Logic
    /// 上交所 `000` 段、深交所 `399` 段、北交所 `899` 段为指数，其余为个股。
    /// 裸代码 `000001` 推断为深交所个股，上证指数需写作 `000001.SH` 或 `sh000001`。
    pub fn kind(&self) -> InstrumentKind {
        let index = match self.exchange {
            Exchange::SH => self.code.starts_with("000"),
            Exchange::SZ => self.code.starts_with("399"),
            Exchange::BJ => self.code.starts_with("899"),
        };
        if index {
            InstrumentKind::Index
        } else {
            InstrumentKind::Stock
        }
    }

    /// 规范化后的完整代码，例如 `600519.SH`。
    pub fn canonical(&self) -> String {
        format!("{}.{}", self.code, self.exchange)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.exchange == other.exchange && self.code == other.code
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.exchange.hash(state);
        self.code.hash(state);
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange)
    }
}

/// # Summary
/// K 线时间粒度枚举。
///
/// # Invariants
/// - 分钟级粒度的时间戳精确到分钟，日及以上粒度精确到日期。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Granularity {
    // 1分钟
    Minute1,
    // 5分钟
    Minute5,
    // 15分钟
    Minute15,
    // 30分钟
    Minute30,
    // 60分钟
    Minute60,
    // 日线
    Day,
    // 周线
    Week,
    // 月线
    Month,
    // 年线
    Year,
}

impl Granularity {
    /// 是否为分钟级粒度。
    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Granularity::Minute1
                | Granularity::Minute5
                | Granularity::Minute15
                | Granularity::Minute30
                | Granularity::Minute60
        )
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "1" | "minute1" => Ok(Granularity::Minute1),
            "5m" | "5" | "minute5" => Ok(Granularity::Minute5),
            "15m" | "15" | "minute15" => Ok(Granularity::Minute15),
            "30m" | "30" | "minute30" => Ok(Granularity::Minute30),
            "60m" | "60" | "1h" | "minute60" => Ok(Granularity::Minute60),
            "d" | "1d" | "day" => Ok(Granularity::Day),
            "w" | "1w" | "week" => Ok(Granularity::Week),
            "m" | "1mo" | "month" => Ok(Granularity::Month),
            "y" | "1y" | "year" => Ok(Granularity::Year),
            _ => Err(format!("Unknown Granularity: {}", s)),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Minute1 => write!(f, "1m"),
            Granularity::Minute5 => write!(f, "5m"),
            Granularity::Minute15 => write!(f, "15m"),
            Granularity::Minute30 => write!(f, "30m"),
            Granularity::Minute60 => write!(f, "60m"),
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

/// # Summary
/// 复权方式枚举，决定历史价格如何处理分红、拆股等公司行为。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Adjustment {
    // 不复权
    #[default]
    None,
    // 前复权
    Forward,
    // 后复权
    Backward,
    // 等比前复权
    RatioForward,
    // 等比后复权
    RatioBackward,
}

impl FromStr for Adjustment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "n" | "none" => Ok(Adjustment::None),
            "f" | "forward" => Ok(Adjustment::Forward),
            "b" | "backward" => Ok(Adjustment::Backward),
            "fr" | "ratio-forward" => Ok(Adjustment::RatioForward),
            "br" | "ratio-backward" => Ok(Adjustment::RatioBackward),
            _ => Err(format!("Unknown Adjustment: {}", s)),
        }
    }
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Adjustment::None => write!(f, "none"),
            Adjustment::Forward => write!(f, "forward"),
            Adjustment::Backward => write!(f, "backward"),
            Adjustment::RatioForward => write!(f, "ratio-forward"),
            Adjustment::RatioBackward => write!(f, "ratio-backward"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_parse_forms() {
        let expected = Symbol {
            exchange: Exchange::SH,
            code: "600519".to_string(),
            name: None,
        };
        for raw in ["600519.SH", "600519.sh", " sh600519 ", "SH600519", "600519"] {
            assert_eq!(Symbol::parse(raw).unwrap(), expected, "input {raw:?}");
        }
        assert_eq!(Symbol::parse("000001").unwrap().exchange, Exchange::SZ);
        assert_eq!(Symbol::parse("830799").unwrap().exchange, Exchange::BJ);
        assert_eq!(Symbol::parse("600519.SH").unwrap().to_string(), "600519.SH");
    }

    #[test]
    fn test_symbol_parse_rejects_garbage() {
        for raw in ["", "AAPL", "60051", "6005190", "600519.XX", "12345a", "500519"] {
            assert!(
                matches!(Symbol::parse(raw), Err(MarketError::InvalidSymbol(_))),
                "input {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_symbol_kind_by_code_range() {
        assert_eq!(Symbol::parse("000001.SH").unwrap().kind(), InstrumentKind::Index);
        assert_eq!(Symbol::parse("sh000300").unwrap().kind(), InstrumentKind::Index);
        assert_eq!(Symbol::parse("399001").unwrap().kind(), InstrumentKind::Index);
        assert_eq!(Symbol::parse("899050.BJ").unwrap().kind(), InstrumentKind::Index);
        assert_eq!(Symbol::parse("000001").unwrap().kind(), InstrumentKind::Stock);
        assert_eq!(Symbol::parse("600519").unwrap().kind(), InstrumentKind::Stock);
        assert_eq!(Symbol::parse("830799").unwrap().kind(), InstrumentKind::Stock);
    }

    #[test]
    fn test_symbol_identity_ignores_name() {
        let a = Symbol::parse("600519.SH").unwrap();
        let b = a.with_name("贵州茅台");
        assert_eq!(a, b);
    }

    #[test]
    fn test_granularity_round_trip_names() {
        assert_eq!("d".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!("15".parse::<Granularity>().unwrap(), Granularity::Minute15);
        assert_eq!(Granularity::Minute60.to_string(), "60m");
        assert!("2d".parse::<Granularity>().is_err());
        assert_eq!("fr".parse::<Adjustment>().unwrap(), Adjustment::RatioForward);
    }
}

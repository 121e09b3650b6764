use crate::market::entity::{Provenance, Series};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// # Summary
/// 指标计算参数。
///
/// # Invariants
/// - 周期为 0 的指标整列为空值，不报错。
/// - `fingerprint` 必须参与历史数据缓存键，参数不同即键不同。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    // 简单均线窗口
    pub ma_windows: Vec<usize>,
    // 指数均线窗口
    pub ema_windows: Vec<usize>,
    // 布林带周期
    pub boll_period: usize,
    // 布林带标准差倍数
    pub boll_k: f64,
    // MACD 快线周期
    pub macd_fast: usize,
    // MACD 慢线周期
    pub macd_slow: usize,
    // MACD 信号线周期
    pub macd_signal: usize,
    // RSI 周期
    pub rsi_period: usize,
    // KDJ 周期
    pub kdj_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20],
            ema_windows: vec![5, 20],
            boll_period: 20,
            boll_k: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            kdj_period: 9,
        }
    }
}

impl IndicatorConfig {
    /// # Summary
    /// 计算参数指纹。
    ///
    /// # Logic
    /// 1. 将配置序列化为 JSON（字段顺序固定）。
    /// 2. 取 SHA-256 摘要的前 8 字节，编码为 16 位十六进制串。
    ///
    /// # Returns
    /// 稳定的指纹字符串。
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        hex::encode(&digest[..8])
    }
}

/// 布林带三轨。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BollingerBands {
    pub mid: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// MACD 三线。`hist` 采用 2 倍约定：`HIST = 2 * (DIF - DEA)`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MacdLines {
    pub dif: Vec<Option<f64>>,
    pub dea: Vec<Option<f64>>,
    pub hist: Vec<Option<f64>>,
}

/// KDJ 三线。J 不做截断。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KdjLines {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub j: Vec<Option<f64>>,
}

/// # Summary
/// 与 Series 按时间一一对齐的指标列集合。
///
/// # Invariants
/// - 每一列长度都等于 `times.len()`。
/// - None 表示窗口未填满或该根 K 线被排除，绝不用 0 或 NaN 代替。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndicatorSet {
    pub times: Vec<DateTime<Utc>>,
    pub sma: BTreeMap<usize, Vec<Option<f64>>>,
    pub ema: BTreeMap<usize, Vec<Option<f64>>>,
    pub boll: BollingerBands,
    pub macd: MacdLines,
    pub rsi: Vec<Option<f64>>,
    pub kdj: KdjLines,
}

impl IndicatorSet {
    /// 对齐的行数。
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// 是否没有任何行。
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 指定窗口的 SMA 列。
    pub fn sma(&self, window: usize) -> Option<&[Option<f64>]> {
        self.sma.get(&window).map(Vec::as_slice)
    }

    /// 指定窗口的 EMA 列。
    pub fn ema(&self, window: usize) -> Option<&[Option<f64>]> {
        self.ema.get(&window).map(Vec::as_slice)
    }
}

/// # Summary
/// 结果附注（PartialData）：成功但有保留意见。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caveat {
    // 历史长度不足，指标窗口无法填满
    InsufficientHistory {
        indicator: String,
        required: usize,
        available: usize,
    },
    // 适配器在边界处拒收了部分原始行
    RejectedRows { count: usize },
}

/// # Summary
/// 编排器输出的指标增强序列。
///
/// # Invariants
/// - `indicators` 与 `series` 逐行对齐。
/// - `provenance` 列出所有由降级规则回填的值。
/// - `complete == caveats.is_empty()`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSeries {
    pub series: Series,
    pub indicators: IndicatorSet,
    pub config_fingerprint: String,
    pub provenance: Vec<Provenance>,
    pub caveats: Vec<Caveat>,
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = IndicatorConfig::default();
        let b = IndicatorConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let c = IndicatorConfig {
            rsi_period: 6,
            ..IndicatorConfig::default()
        };
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}

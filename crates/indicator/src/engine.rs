use crate::average::{ema, sma};
use crate::boll::bollinger;
use crate::kdj::{Hlc, kdj};
use crate::macd::{self, macd};
use crate::rsi::rsi;
use chrono::{DateTime, Utc};
use kxian_core::indicator::entity::{
    BollingerBands, Caveat, IndicatorConfig, IndicatorSet, KdjLines, MacdLines,
};
use kxian_core::market::entity::{Bar, Series};

/// 压缩后的有效值序列及其在原序列中的位置。
struct Compacted<T> {
    positions: Vec<usize>,
    values: Vec<T>,
}

impl<T> Compacted<T> {
    fn from_bars(bars: &[Bar], pick: impl Fn(&Bar) -> Option<T>) -> Self {
        let (positions, values) = bars
            .iter()
            .enumerate()
            .filter(|(_, bar)| !bar.suspended)
            .filter_map(|(i, bar)| pick(bar).map(|v| (i, v)))
            .unzip();
        Self { positions, values }
    }

    /// 将压缩序列上的结果回填到原序列长度，被排除的位置保持 None。
    fn scatter(&self, column: Vec<Option<f64>>, len: usize) -> Vec<Option<f64>> {
        let mut out = vec![None; len];
        for (pos, value) in self.positions.iter().zip(column) {
            out[*pos] = value;
        }
        out
    }
}

/// # Summary
/// 计算整套技术指标。
///
/// # Logic
/// 1. 剔除停牌或缺少收盘价的 K 线，得到压缩收盘价序列（KDJ 另需最高/最低价）。
/// 2. 在压缩序列上逐个计算 SMA、EMA、布林带、MACD、RSI、KDJ。
/// 3. 将结果按原位置回填，被排除的 K 线在每一列都为 None。
///
/// # Arguments
/// * `series`: 升序 K 线序列（只读）。
/// * `config`: 指标参数。
///
/// # Returns
/// 与 `series.bars` 逐行对齐的 IndicatorSet。空序列或单根序列返回全空列。
pub fn compute(series: &Series, config: &IndicatorConfig) -> IndicatorSet {
    let len = series.len();
    let times = series.bars.iter().map(|bar| bar.time).collect();

    if len < 2 {
        return empty(times, len, config);
    }

    let closes = Compacted::from_bars(&series.bars, |bar| bar.close);
    let spread = |column: Vec<Option<f64>>| closes.scatter(column, len);

    let sma_columns = config
        .ma_windows
        .iter()
        .map(|w| (*w, spread(sma(&closes.values, *w))))
        .collect();
    let ema_columns = config
        .ema_windows
        .iter()
        .map(|w| (*w, spread(ema(&closes.values, *w))))
        .collect();

    let bands = bollinger(&closes.values, config.boll_period, config.boll_k);
    let lines = macd(
        &closes.values,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    );

    let hlc = Compacted::from_bars(&series.bars, |bar| {
        Some(Hlc {
            high: bar.high?,
            low: bar.low?,
            close: bar.close?,
        })
    });
    let stochastic = kdj(&hlc.values, config.kdj_period);

    IndicatorSet {
        times,
        sma: sma_columns,
        ema: ema_columns,
        boll: BollingerBands {
            mid: spread(bands.mid),
            upper: spread(bands.upper),
            lower: spread(bands.lower),
        },
        macd: MacdLines {
            dif: spread(lines.dif),
            dea: spread(lines.dea),
            hist: spread(lines.hist),
        },
        rsi: spread(rsi(&closes.values, config.rsi_period)),
        kdj: KdjLines {
            k: hlc.scatter(stochastic.k, len),
            d: hlc.scatter(stochastic.d, len),
            j: hlc.scatter(stochastic.j, len),
        },
    }
}

fn empty(times: Vec<DateTime<Utc>>, len: usize, config: &IndicatorConfig) -> IndicatorSet {
    let blank = || vec![None; len];
    IndicatorSet {
        times,
        sma: config.ma_windows.iter().map(|w| (*w, blank())).collect(),
        ema: config.ema_windows.iter().map(|w| (*w, blank())).collect(),
        boll: BollingerBands {
            mid: blank(),
            upper: blank(),
            lower: blank(),
        },
        macd: MacdLines {
            dif: blank(),
            dea: blank(),
            hist: blank(),
        },
        rsi: blank(),
        kdj: KdjLines {
            k: blank(),
            d: blank(),
            j: blank(),
        },
    }
}

/// # Summary
/// 列出有效 K 线数不足以填满窗口的指标。
///
/// # Logic
/// 对每个周期非零的指标，比较所需有效 K 线数与实际数量，不足时产生 `InsufficientHistory`。
///
/// # Returns
/// 附注列表，按 SMA、EMA、BOLL、MACD、RSI、KDJ 顺序。
pub fn shortfalls(series: &Series, config: &IndicatorConfig) -> Vec<Caveat> {
    let eligible = series
        .bars
        .iter()
        .filter(|bar| !bar.suspended && bar.close.is_some())
        .count();
    let eligible_hlc = series
        .bars
        .iter()
        .filter(|bar| {
            !bar.suspended && bar.close.is_some() && bar.high.is_some() && bar.low.is_some()
        })
        .count();

    // 单根序列不计算任何指标
    let too_short = series.len() < 2;

    let mut required: Vec<(String, usize, usize)> = Vec::new();
    required.extend(
        config
            .ma_windows
            .iter()
            .map(|w| (format!("sma{w}"), *w, eligible)),
    );
    required.extend(
        config
            .ema_windows
            .iter()
            .map(|w| (format!("ema{w}"), *w, eligible)),
    );
    required.push(("boll".to_string(), config.boll_period, eligible));
    if config.macd_fast > 0 && config.macd_slow > 0 && config.macd_signal > 0 {
        required.push((
            "macd".to_string(),
            macd::lookback(config.macd_fast, config.macd_slow, config.macd_signal),
            eligible,
        ));
    }
    required.push(("rsi".to_string(), config.rsi_period, eligible));
    required.push(("kdj".to_string(), config.kdj_period, eligible_hlc));

    required
        .into_iter()
        .filter(|(_, need, have)| *need > 0 && (have < need || too_short))
        .map(|(indicator, need, have)| Caveat::InsufficientHistory {
            indicator,
            required: need,
            available: have,
        })
        .collect()
}

//! 简单移动平均与指数移动平均。
//!
//! SMA 逐窗口直接求和（不做滑动累加），保证 SMA(1) 与收盘价逐位相等。
//! EMA 在第 n 个值处以 SMA(n) 作为种子，之后 `EMA_t = v_t·k + EMA_{t-1}·(1−k)`，`k = 2/(n+1)`。

use crate::period_f64;

/// # Summary
/// 简单移动平均。
///
/// # Arguments
/// * `values`: 已压缩的有效值序列。
/// * `period`: 窗口长度，0 时整列为空。
///
/// # Returns
/// 与输入等长的结果，前 `period - 1` 个为 None。
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let divisor = period_f64(period);
    for end in period..=values.len() {
        let sum: f64 = values[end - period..end].iter().sum();
        out[end - 1] = Some(sum / divisor);
    }
    out
}

/// # Summary
/// 指数移动平均，以前 `period` 个值的 SMA 为种子。
///
/// # Arguments
/// * `values`: 已压缩的有效值序列。
/// * `period`: 周期，0 时整列为空。
///
/// # Returns
/// 与输入等长的结果，前 `period - 1` 个为 None。
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period_f64(period) + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period_f64(period);
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, value) in values.iter().enumerate().skip(period) {
        prev = value * k + prev * (1.0 - k);
        out[i] = Some(prev);
    }
    out
}

/// # Summary
/// 对一列"从某处开始连续有值"的序列求 EMA（如 MACD 的 DIF）。
///
/// # Logic
/// 找到第一个有值的位置，对其后的连续有值段调用 `ema`，结果写回原位置。
/// 段内出现空值时在此截断，之后保持为空。
pub fn ema_of_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    let run: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in ema(&run, period).into_iter().enumerate() {
        out[start + offset] = value;
    }
    out
}

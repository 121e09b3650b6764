//! MACD：DIF = EMA(fast) − EMA(slow)；DEA = DIF 的 EMA(signal)，以前 signal 个 DIF 的均值为种子；
//! HIST = 2·(DIF − DEA)。

use crate::average::{ema, ema_of_defined};
use kxian_core::indicator::entity::MacdLines;

/// # Summary
/// 计算 MACD 三线。
///
/// # Arguments
/// * `closes`: 已压缩的收盘价序列。
/// * `fast` / `slow` / `signal`: 周期，任一为 0 时三线全空。
///
/// # Returns
/// 与输入等长的三列。
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdLines {
    let len = closes.len();
    if fast == 0 || slow == 0 || signal == 0 {
        return MacdLines {
            dif: vec![None; len],
            dea: vec![None; len],
            hist: vec![None; len],
        };
    }

    let fast_line = ema(closes, fast);
    let slow_line = ema(closes, slow);
    let dif: Vec<Option<f64>> = fast_line
        .iter()
        .zip(&slow_line)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let dea = ema_of_defined(&dif, signal);
    let hist = dif
        .iter()
        .zip(&dea)
        .map(|(d, e)| Some(2.0 * ((*d)? - (*e)?)))
        .collect();

    MacdLines { dif, dea, hist }
}

/// 第一个 DEA 出现前需要的有效 K 线数。
pub fn lookback(fast: usize, slow: usize, signal: usize) -> usize {
    fast.max(slow) + signal.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;

    #[test]
    fn macd_first_values() {
        let closes: Vec<f64> = (1..=10).map(f64::from).collect();
        let lines = macd(&closes, 2, 3, 2);

        // DIF 从慢线种子处开始
        assert_eq!(lines.dif[1], None);
        assert!(lines.dif[2].is_some());
        // DEA 需要 2 个 DIF
        assert_eq!(lines.dea[2], None);
        assert!(lines.dea[3].is_some());
        assert_eq!(lines.hist[2], None);
        assert_eq!(lookback(2, 3, 2), 4);
    }

    #[test]
    fn macd_constant_series_is_flat() {
        let closes = vec![10.0; 40];
        let lines = macd(&closes, 12, 26, 9);
        assert_eq!(lines.dea[32], None);
        assert_approx(lines.dif[33], 0.0);
        assert_approx(lines.dea[33], 0.0);
        assert_approx(lines.hist[39], 0.0);
    }

    #[test]
    fn macd_zero_period_is_empty() {
        let lines = macd(&[1.0, 2.0, 3.0], 0, 3, 2);
        assert!(lines.dif.iter().all(Option::is_none));
        assert_eq!(lines.hist.len(), 3);
    }
}

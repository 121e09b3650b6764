//! Relative Strength Index (RSI)，Wilder 平滑。
//!
//! 每根的涨跌为与上一有效收盘价之差，首根记为 0，因此第一个值出现在第 n 根。
//! 种子为前 n 个涨幅/跌幅的简单均值，之后 `avg_t = (avg_{t-1}·(n−1) + value_t)/n`。
//! `RSI = 100 − 100/(1 + avg_gain/avg_loss)`，`avg_loss == 0` 时为 100。

use crate::period_f64;

pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let changes: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| i.checked_sub(1).map_or(0.0, |p| close - closes[p]))
        .collect();
    let n = period_f64(period);

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / n;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / n;
    out[period - 1] = Some(strength(avg_gain, avg_loss));

    for (i, change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
        out[i] = Some(strength(avg_gain, avg_loss));
    }
    out
}

fn strength(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;

    #[test]
    fn rsi_all_gains() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0], 3);
        assert_eq!(result[1], None);
        assert_approx(result[2], 100.0);
        assert_approx(result[4], 100.0);
    }

    #[test]
    fn rsi_all_losses() {
        let result = rsi(&[105.0, 104.0, 103.0, 102.0], 3);
        assert_approx(result[2], 0.0);
        assert_approx(result[3], 0.0);
    }

    #[test]
    fn rsi_mixed_with_wilder_smoothing() {
        // changes: 0, +2, -1, +1
        // seed (n=3): gain=2/3, loss=1/3 -> RSI = 100 - 100/3 = 66.666..
        // next: gain=(2/3*2+1)/3=7/9, loss=(1/3*2)/3=2/9 -> RS=3.5 -> RSI=77.777..
        let result = rsi(&[10.0, 12.0, 11.0, 12.0], 3);
        assert_approx(result[2], 100.0 - 100.0 / 3.0);
        assert_approx(result[3], 100.0 - 100.0 / 4.5);
    }

    #[test]
    fn rsi_flat_series_is_hundred() {
        let result = rsi(&[5.0; 4], 2);
        assert_approx(result[1], 100.0);
    }
}

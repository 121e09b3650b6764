//! 布林带：中轨 SMA(n)，上下轨为中轨 ± k·σ（总体标准差，除以 n）。

use crate::average::sma;
use crate::period_f64;
use kxian_core::indicator::entity::BollingerBands;

pub fn bollinger(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    let mid = sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for (i, mean) in mid.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        let window = &closes[i + 1 - period..=i];
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period_f64(period);
        let width = k * variance.sqrt();
        upper[i] = Some(mean + width);
        lower[i] = Some(mean - width);
    }

    BollingerBands { mid, upper, lower }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;

    #[test]
    fn bollinger_population_stddev() {
        // 窗口 [2, 4, 4, 4, 5, 5, 7, 9]：均值 5，总体方差 4，σ = 2
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(&closes, 8, 2.0);
        assert_eq!(bands.mid[6], None);
        assert_approx(bands.mid[7], 5.0);
        assert_approx(bands.upper[7], 9.0);
        assert_approx(bands.lower[7], 1.0);
    }

    #[test]
    fn bollinger_constant_series_collapses() {
        let bands = bollinger(&[3.0; 5], 3, 2.0);
        assert_approx(bands.upper[4], 3.0);
        assert_approx(bands.lower[4], 3.0);
    }
}

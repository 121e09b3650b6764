//! 随机指标 KDJ。
//!
//! `RSV = 100·(C − LL_n)/(HH_n − LL_n)`，区间为 0 时 RSV = 50。
//! K、D 在首个完整窗口之前以 50 为种子：`K = K′·2/3 + RSV/3`，`D = D′·2/3 + K/3`，`J = 3K − 2D`。
//! J 不做截断，可能小于 0 或大于 100。

use kxian_core::indicator::entity::KdjLines;

/// 参与 KDJ 计算的一根 K 线（已剔除任一价格缺失者）。
#[derive(Debug, Clone, Copy)]
pub struct Hlc {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

pub fn kdj(bars: &[Hlc], period: usize) -> KdjLines {
    let len = bars.len();
    let mut lines = KdjLines {
        k: vec![None; len],
        d: vec![None; len],
        j: vec![None; len],
    };
    if period == 0 || len < period {
        return lines;
    }

    let (mut k, mut d) = (50.0, 50.0);
    for end in period..=len {
        let window = &bars[end - period..end];
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        let close = bars[end - 1].close;
        let rsv = if range == 0.0 {
            50.0
        } else {
            100.0 * (close - lowest) / range
        };

        k = k * 2.0 / 3.0 + rsv / 3.0;
        d = d * 2.0 / 3.0 + k / 3.0;
        lines.k[end - 1] = Some(k);
        lines.d[end - 1] = Some(d);
        lines.j[end - 1] = Some(3.0 * k - 2.0 * d);
    }
    lines
}

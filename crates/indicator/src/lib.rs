//! # `kxian-indicator` - 技术指标引擎
//!
//! 纯函数、确定性、无副作用。输入规范化 Series 与参数，输出逐行对齐的 IndicatorSet。
//!
//! 各指标模块只处理"已压缩"的有效值序列（剔除停牌与缺失收盘价的 K 线），
//! 由 `engine` 负责压缩与回填对齐。

pub mod average;
pub mod boll;
pub mod engine;
pub mod kdj;
pub mod macd;
pub mod rsi;

pub use engine::{compute, shortfalls};

/// 窗口长度转浮点。周期远小于 `u32::MAX`，超出时饱和。
pub(crate) fn period_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap_or(f64::NAN);
    assert!(
        (actual - expected).abs() < 1e-9,
        "assert_approx failed: actual={actual}, expected={expected}"
    );
}

//! 指标不变量的属性测试。
//!
//! 1. SMA(n) 等于最近 n 个有效收盘价的算术平均
//! 2. SMA(1) 与收盘价逐位相等
//! 3. EMA 第 n 个值等于前 n 个收盘价的 SMA
//! 4. MACD 柱 = 2·(DIF − DEA)
//! 5. RSI ∈ [0, 100]
//! 6. KDJ 的 K、D ∈ [0, 100]（J 不受约束）

use kxian_core::common::Symbol;
use kxian_core::indicator::entity::IndicatorConfig;
use kxian_core::testing::daily_series;
use kxian_indicator::compute;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((1.0..5000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0), 2..80)
}

fn arb_period() -> impl Strategy<Value = usize> {
    1usize..30
}

fn config_with(period: usize) -> IndicatorConfig {
    IndicatorConfig {
        ma_windows: vec![1, period],
        ema_windows: vec![period],
        boll_period: period,
        rsi_period: period,
        kdj_period: period,
        ..IndicatorConfig::default()
    }
}

fn as_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap())
}

fn symbol() -> Symbol {
    Symbol::parse("000001.SZ").unwrap()
}

proptest! {
    #[test]
    fn sma_is_trailing_mean(closes in arb_closes(), period in arb_period()) {
        let set = compute(&daily_series(&symbol(), &closes), &config_with(period));
        let sma = set.sma(period).unwrap();
        for (i, value) in sma.iter().enumerate() {
            if i + 1 < period {
                prop_assert!(value.is_none());
            } else {
                let window = &closes[i + 1 - period..=i];
                let mean = window.iter().sum::<f64>() / as_f64(window.len());
                prop_assert!((value.unwrap() - mean).abs() < 1e-9 * mean.abs().max(1.0));
            }
        }
    }

    #[test]
    fn sma_one_is_identity(closes in arb_closes()) {
        let set = compute(&daily_series(&symbol(), &closes), &config_with(3));
        let sma1 = set.sma(1).unwrap();
        for (value, close) in sma1.iter().zip(&closes) {
            prop_assert_eq!(*value, Some(*close));
        }
    }

    #[test]
    fn ema_seeded_with_sma(closes in arb_closes(), period in arb_period()) {
        prop_assume!(closes.len() >= period);
        let set = compute(&daily_series(&symbol(), &closes), &config_with(period));
        let ema = set.ema(period).unwrap();
        let seed = closes[..period].iter().sum::<f64>() / as_f64(period);
        prop_assert!(ema[..period - 1].iter().all(Option::is_none));
        prop_assert!((ema[period - 1].unwrap() - seed).abs() < 1e-9 * seed.max(1.0));
    }

    #[test]
    fn macd_hist_is_twice_spread(closes in arb_closes()) {
        let set = compute(&daily_series(&symbol(), &closes), &IndicatorConfig::default());
        for i in 0..closes.len() {
            match (set.macd.dif[i], set.macd.dea[i], set.macd.hist[i]) {
                (Some(dif), Some(dea), Some(hist)) => {
                    prop_assert!((hist - 2.0 * (dif - dea)).abs() < 1e-9);
                }
                (_, None, hist) => prop_assert!(hist.is_none()),
                (None, Some(_), _) => prop_assert!(false, "DEA without DIF"),
                (Some(_), Some(_), None) => prop_assert!(false, "missing HIST"),
            }
        }
    }

    #[test]
    fn rsi_stays_in_range(closes in arb_closes(), period in arb_period()) {
        let set = compute(&daily_series(&symbol(), &closes), &config_with(period));
        for value in set.rsi.iter().flatten() {
            prop_assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn kdj_k_and_d_stay_in_range(closes in arb_closes(), period in arb_period()) {
        let set = compute(&daily_series(&symbol(), &closes), &config_with(period));
        for value in set.kdj.k.iter().chain(&set.kdj.d).flatten() {
            prop_assert!((-1e-9..=100.0 + 1e-9).contains(value));
        }
        for ((k, d), j) in set.kdj.k.iter().zip(&set.kdj.d).zip(&set.kdj.j) {
            if let (Some(k), Some(d), Some(j)) = (k, d, j) {
                prop_assert!((j - (3.0 * k - 2.0 * d)).abs() < 1e-9);
            }
        }
    }
}

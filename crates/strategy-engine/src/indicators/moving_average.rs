use crate::indicators::{
    combine, first_full_window, is_defined, mean, rolling, undefined, Series,
};

// ============================================================================
// SMA
// ============================================================================
/// Simple Moving Average (SMA).
///
/// An unweighted mean of the last `period` values; the first `period - 1`
/// outputs are undefined.
pub fn sma(src: &[f64], period: usize) -> Series {
    rolling(src, period, mean)
}

// ============================================================================
// EMA
// ============================================================================
/// Exponential Moving Average (EMA).
///
/// Seeded with the SMA of the first full window, then
/// `ema = prev + alpha * (x - prev)` with `alpha = 2 / (period + 1)`.
pub fn ema(src: &[f64], period: usize) -> Series {
    let alpha = 2.0 / (period as f64 + 1.0);
    seeded_recursion(src, period, |prev, x| prev + alpha * (x - prev))
}

// ============================================================================
// SMMA
// ============================================================================
/// Smoothed Moving Average (SMMA, Wilder's RMA).
///
/// `smma = (prev * (period - 1) + x) / period`, seeded like [`ema`].
pub fn smma(src: &[f64], period: usize) -> Series {
    let n = period as f64;
    seeded_recursion(src, period, |prev, x| (prev * (n - 1.0) + x) / n)
}

/// Shared forward recursion for EMA-style smoothers.
///
/// Leading undefined values (from an upstream indicator's warm-up) are
/// skipped: the seed is the mean of the first run of `period` defined values
/// and the recursion continues strictly forward from there.
pub(crate) fn seeded_recursion<F>(src: &[f64], period: usize, step: F) -> Series
where
    F: Fn(f64, f64) -> f64,
{
    let mut out = undefined(src.len());
    let Some(start) = first_full_window(src, period) else {
        return out;
    };
    let seed_index = start + period - 1;
    let mut prev = mean(&src[start..=seed_index]);
    out[seed_index] = prev;
    for i in seed_index + 1..src.len() {
        prev = step(prev, src[i]);
        out[i] = prev;
    }
    out
}

// ============================================================================
// WMA
// ============================================================================
/// Linearly Weighted Moving Average (WMA).
///
/// The newest value carries weight `period`, the oldest weight 1.
pub fn wma(src: &[f64], period: usize) -> Series {
    if period == 0 || period > src.len() {
        return undefined(src.len());
    }
    let n = period as f64;
    let denominator = n * (n + 1.0) / 2.0;
    rolling(src, period, |window| {
        window
            .iter()
            .enumerate()
            .map(|(i, v)| v * (i + 1) as f64)
            .sum::<f64>()
            / denominator
    })
}

// ============================================================================
// HMA
// ============================================================================
/// Hull Moving Average.
///
/// `wma(2 * wma(src, period / 2) - wma(src, period), sqrt(period))`.
pub fn hma(src: &[f64], period: usize) -> Series {
    if period == 0 {
        return undefined(src.len());
    }
    let half = (period / 2).max(1);
    let root = ((period as f64).sqrt().floor() as usize).max(1);
    let raw = combine(&wma(src, half), &wma(src, period), |h, f| 2.0 * h - f);
    wma(&raw, root)
}

// ============================================================================
// ALMA
// ============================================================================
/// Arnaud Legoux Moving Average.
///
/// Gaussian-weighted window centred at `offset * (period - 1)` with width
/// `period / sigma`.
pub fn alma(src: &[f64], period: usize, offset: f64, sigma: f64) -> Series {
    if period == 0 || period > src.len() || sigma <= 0.0 {
        return undefined(src.len());
    }
    let m = offset * (period as f64 - 1.0);
    let s = period as f64 / sigma;
    let weights: Vec<f64> = (0..period)
        .map(|i| (-((i as f64 - m).powi(2)) / (2.0 * s * s)).exp())
        .collect();
    let norm: f64 = weights.iter().sum();
    rolling(src, period, |window| {
        window
            .iter()
            .zip(&weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / norm
    })
}

// ============================================================================
// TEMA
// ============================================================================
/// Triple Exponential Moving Average: `3*e1 - 3*e2 + e3`.
///
/// Each stage inherits the warm-up of the previous one, so the first defined
/// output sits at `3 * (period - 1)`.
pub fn tema(src: &[f64], period: usize) -> Series {
    let e1 = ema(src, period);
    let e2 = ema(&e1, period);
    let e3 = ema(&e2, period);
    let lhs = combine(&e1, &e2, |a, b| 3.0 * a - 3.0 * b);
    combine(&lhs, &e3, |a, c| a + c)
}

// ============================================================================
// KAMA
// ============================================================================
/// Kaufman Adaptive Moving Average.
///
/// The smoothing constant adapts to the efficiency ratio of the last
/// `period` bars, between `2 / (fast + 1)` and `2 / (slow + 1)`. Seeded with
/// the price at the end of the first window.
pub fn kama(src: &[f64], period: usize, fast: usize, slow: usize) -> Series {
    let mut out = undefined(src.len());
    let Some(start) = first_full_window(src, period) else {
        return out;
    };
    let fast_sc = 2.0 / (fast as f64 + 1.0);
    let slow_sc = 2.0 / (slow as f64 + 1.0);

    let seed_index = start + period - 1;
    let mut prev = src[seed_index];
    out[seed_index] = prev;

    for i in seed_index + 1..src.len() {
        let window = &src[i - period..=i];
        if !window.iter().all(|v| is_defined(*v)) {
            prev = f64::NAN;
            out[i] = prev;
            continue;
        }
        let change = (src[i] - src[i - period]).abs();
        let volatility: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        let efficiency = if volatility == 0.0 {
            0.0
        } else {
            change / volatility
        };
        let sc = (efficiency * (fast_sc - slow_sc) + slow_sc).powi(2);
        prev += sc * (src[i] - prev);
        out[i] = prev;
    }
    out
}

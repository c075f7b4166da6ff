use crate::indicators::moving_average::{ema, sma};
use crate::indicators::{
    changes, combine, first_full_window, highest, is_defined, lowest, map_defined, mean, rolling,
    rolling_sum, undefined, Record, Series, UNDEFINED,
};

/// %K/%D pair shared by the stochastic family.
#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Series,
    pub d: Series,
}

impl Record for Stochastic {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("k", self.k), ("d", self.d)]
    }
}

/// Indicator line with its smoothed signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalLine {
    pub value: Series,
    pub signal: Series,
}

// ============================================================================
// RSI
// ============================================================================
/// Relative Strength Index (RSI), Wilder smoothing.
///
/// The first average gain/loss is the plain mean of the first `period`
/// changes; the first defined output is at index `period`. A window with no
/// losses reads 100, and a perfectly flat one reads 50.
pub fn rsi(src: &[f64], period: usize) -> Series {
    let mut out = undefined(src.len());
    let Some(start) = first_full_window(src, period + 1) else {
        return out;
    };
    if period == 0 {
        return out;
    }
    let n = period as f64;
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
    for i in start + 1..=start + period {
        let change = src[i] - src[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= n;
    avg_loss /= n;
    out[start + period] = rsi_value(avg_gain, avg_loss);

    for i in start + period + 1..src.len() {
        let change = src[i] - src[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

// ============================================================================
// Stochastic
// ============================================================================
/// Stochastic Oscillator.
///
/// `%K = 100 * (close - lowest low) / (highest high - lowest low)` over
/// `k_period` bars, `%D = sma(%K, d_period)`. A zero-width range reads 50.
pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> Stochastic {
    let hh = highest(high, k_period);
    let ll = lowest(low, k_period);
    let k: Series = (0..close.len())
        .map(|i| stochastic_value(close[i], hh[i], ll[i]))
        .collect();
    let d = sma(&k, d_period);
    Stochastic { k, d }
}

fn stochastic_value(value: f64, hh: f64, ll: f64) -> f64 {
    if !(is_defined(value) && is_defined(hh) && is_defined(ll)) {
        return UNDEFINED;
    }
    let range = hh - ll;
    if range == 0.0 {
        50.0
    } else {
        100.0 * (value - ll) / range
    }
}

/// Stochastic of a single series against its own rolling range.
fn self_stochastic(src: &[f64], period: usize) -> Series {
    let hh = highest(src, period);
    let ll = lowest(src, period);
    (0..src.len())
        .map(|i| stochastic_value(src[i], hh[i], ll[i]))
        .collect()
}

// ============================================================================
// Stochastic RSI
// ============================================================================
/// Stochastic RSI: the stochastic formula applied to RSI values, with %K and
/// %D smoothing.
pub fn stoch_rsi(
    src: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
) -> Stochastic {
    let raw = self_stochastic(&rsi(src, rsi_period), stoch_period);
    let k = sma(&raw, k_period);
    let d = sma(&k, d_period);
    Stochastic { k, d }
}

// ============================================================================
// CCI
// ============================================================================
/// Commodity Channel Index.
///
/// `(tp - sma(tp)) / (0.015 * mean deviation)` on the typical price. A zero
/// mean deviation reads 0.
pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    let tp = typical_price(high, low, close);
    rolling(&tp, period, |window| {
        let avg = mean(window);
        let deviation = window.iter().map(|v| (v - avg).abs()).sum::<f64>() / window.len() as f64;
        if deviation == 0.0 {
            0.0
        } else {
            (window[window.len() - 1] - avg) / (0.015 * deviation)
        }
    })
}

/// CCI with an SMA-smoothed companion line.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedCci {
    pub cci: Series,
    pub smoothed: Series,
}

impl Record for SmoothedCci {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("cci", self.cci), ("smoothed", self.smoothed)]
    }
}

pub fn cci_smoothed(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    smoothing: usize,
) -> SmoothedCci {
    let cci = cci(high, low, close, period);
    let smoothed = sma(&cci, smoothing);
    SmoothedCci { cci, smoothed }
}

pub(crate) fn typical_price(high: &[f64], low: &[f64], close: &[f64]) -> Series {
    let hl = combine(high, low, |h, l| h + l);
    combine(&hl, close, |hl, c| (hl + c) / 3.0)
}

// ============================================================================
// Williams %R
// ============================================================================
/// Williams %R, on a -100..0 scale. A zero-width range reads -50.
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    let hh = highest(high, period);
    let ll = lowest(low, period);
    (0..close.len())
        .map(|i| {
            if !(is_defined(close[i]) && is_defined(hh[i]) && is_defined(ll[i])) {
                return UNDEFINED;
            }
            let range = hh[i] - ll[i];
            if range == 0.0 {
                -50.0
            } else {
                -100.0 * (hh[i] - close[i]) / range
            }
        })
        .collect()
}

// ============================================================================
// Ultimate Oscillator
// ============================================================================
/// Ultimate Oscillator combining buying pressure over three horizons with
/// weights 4:2:1.
pub fn ultimate_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    short: usize,
    medium: usize,
    long: usize,
) -> Series {
    let len = close.len();
    let mut pressure = undefined(len);
    let mut range = undefined(len);
    for i in 1..len {
        let prev_close = close[i - 1];
        let true_low = low[i].min(prev_close);
        let true_high = high[i].max(prev_close);
        pressure[i] = close[i] - true_low;
        range[i] = true_high - true_low;
    }

    let averages: Vec<Series> = [short, medium, long]
        .iter()
        .map(|&p| {
            combine(&rolling_sum(&pressure, p), &rolling_sum(&range, p), |bp, tr| {
                if tr == 0.0 {
                    0.5
                } else {
                    bp / tr
                }
            })
        })
        .collect();

    (0..len)
        .map(|i| {
            let (a, b, c) = (averages[0][i], averages[1][i], averages[2][i]);
            if is_defined(a) && is_defined(b) && is_defined(c) {
                100.0 * (4.0 * a + 2.0 * b + c) / 7.0
            } else {
                UNDEFINED
            }
        })
        .collect()
}

// ============================================================================
// Awesome / Accelerator Oscillators
// ============================================================================
/// Awesome Oscillator: `sma(median, fast) - sma(median, slow)`.
pub fn awesome_oscillator(high: &[f64], low: &[f64], fast: usize, slow: usize) -> Series {
    let median = combine(high, low, |h, l| (h + l) / 2.0);
    combine(&sma(&median, fast), &sma(&median, slow), |f, s| f - s)
}

/// Accelerator Oscillator: AO minus its `signal`-period SMA.
pub fn accelerator_oscillator(
    high: &[f64],
    low: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Series {
    let ao = awesome_oscillator(high, low, fast, slow);
    combine(&ao, &sma(&ao, signal), |a, s| a - s)
}

// ============================================================================
// CMO
// ============================================================================
/// Chande Momentum Oscillator over `period` one-bar changes. Zero movement
/// reads 0.
pub fn cmo(src: &[f64], period: usize) -> Series {
    rolling(&changes(src), period, |window| {
        let up: f64 = window.iter().filter(|c| **c > 0.0).sum();
        let down: f64 = -window.iter().filter(|c| **c < 0.0).sum::<f64>();
        if up + down == 0.0 {
            0.0
        } else {
            100.0 * (up - down) / (up + down)
        }
    })
}

// ============================================================================
// ROC
// ============================================================================
/// Rate of change in percent over `period` bars. A zero base reads 0.
pub fn roc(src: &[f64], period: usize) -> Series {
    let mut out = undefined(src.len());
    if period == 0 {
        return out;
    }
    for i in period..src.len() {
        let (now, base) = (src[i], src[i - period]);
        if is_defined(now) && is_defined(base) {
            out[i] = if base == 0.0 {
                0.0
            } else {
                100.0 * (now - base) / base
            };
        }
    }
    out
}

// ============================================================================
// STC
// ============================================================================
/// Schaff Trend Cycle.
///
/// A double stochastic of the MACD line, each pass smoothed with
/// `prev + factor * (x - prev)`.
pub fn stc(src: &[f64], fast: usize, slow: usize, cycle: usize, factor: f64) -> Series {
    let macd = combine(&ema(src, fast), &ema(src, slow), |f, s| f - s);
    let first = factor_smooth(&self_stochastic(&macd, cycle), factor);
    factor_smooth(&self_stochastic(&first, cycle), factor)
}

fn factor_smooth(src: &[f64], factor: f64) -> Series {
    let mut out = undefined(src.len());
    let mut prev = UNDEFINED;
    for (i, &x) in src.iter().enumerate() {
        if !is_defined(x) {
            continue;
        }
        prev = if is_defined(prev) {
            prev + factor * (x - prev)
        } else {
            x
        };
        out[i] = prev;
    }
    out
}

// ============================================================================
// TSI
// ============================================================================
/// True Strength Index with its EMA signal line.
pub fn tsi(src: &[f64], long: usize, short: usize, signal: usize) -> SignalLine {
    let momentum = changes(src);
    let magnitude = map_defined(&momentum, f64::abs);
    let smoothed = ema(&ema(&momentum, long), short);
    let smoothed_abs = ema(&ema(&magnitude, long), short);
    let value = combine(&smoothed, &smoothed_abs, |m, a| {
        if a == 0.0 {
            0.0
        } else {
            100.0 * m / a
        }
    });
    let signal = ema(&value, signal);
    SignalLine { value, signal }
}

// ============================================================================
// KST
// ============================================================================
/// Know Sure Thing: weighted sum of four smoothed rates of change, with an
/// SMA signal line.
pub fn kst(src: &[f64], signal: usize) -> SignalLine {
    const LEGS: [(usize, usize, f64); 4] = [(10, 10, 1.0), (15, 10, 2.0), (20, 10, 3.0), (30, 15, 4.0)];
    let mut value: Series = vec![0.0; src.len()];
    for (roc_period, sma_period, weight) in LEGS {
        let leg = sma(&roc(src, roc_period), sma_period);
        value = combine(&value, &leg, |acc, l| acc + weight * l);
    }
    let signal = sma(&value, signal);
    SignalLine { value, signal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::*;

    #[test]
    fn rsi_is_100_for_monotonic_gains() {
        let src: Vec<f64> = (1..=20).map(|v| f64::from(v) * 10.0).collect();
        let out = rsi(&src, 14);
        assert_eq!(undefined_prefix(&out), 14);
        assert!(out[14..].iter().all(|v| (*v - 100.0).abs() < 1e-12));
    }

    #[test]
    fn rsi_flat_reads_neutral() {
        let out = rsi(&[50.0; 20], 14);
        assert!(out[14..].iter().all(|v| *v == 50.0));
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let (_, _, _, close, _) = ohlcv(120);
        let out = rsi(&close, 14);
        assert!(out[14..].iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn rsi_needs_more_than_period_values() {
        assert!(rsi(&[1.0; 14], 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn stochastic_zero_range_is_neutral() {
        let flat = [10.0; 6];
        let out = stochastic(&flat, &flat, &flat, 3, 2);
        assert_eq!(undefined_prefix(&out.k), 2);
        assert_eq!(undefined_prefix(&out.d), 3);
        assert!(out.k[2..].iter().all(|v| *v == 50.0));
    }

    #[test]
    fn stochastic_at_top_of_range_is_100() {
        let high = [1.0, 2.0, 3.0];
        let low = [0.0, 1.0, 2.0];
        let close = [0.5, 1.5, 3.0];
        let out = stochastic(&high, &low, &close, 3, 1);
        assert_eq!(out.k[2], 100.0);
        assert_eq!(out.d[2], 100.0);
    }

    #[test]
    fn williams_r_zero_range_is_midpoint() {
        let flat = [4.0; 5];
        let out = williams_r(&flat, &flat, &flat, 3);
        assert!(out[2..].iter().all(|v| *v == -50.0));
        assert_eq!(undefined_prefix(&out), 2);
    }

    #[test]
    fn cci_zero_deviation_reads_zero() {
        let flat = [9.0; 25];
        let out = cci(&flat, &flat, &flat, 20);
        assert_eq!(undefined_prefix(&out), 19);
        assert!(out[19..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn smoothed_cci_propagates_warmup() {
        let (_, high, low, close, _) = ohlcv(60);
        let out = cci_smoothed(&high, &low, &close, 20, 5);
        assert_eq!(undefined_prefix(&out.cci), 19);
        assert_eq!(undefined_prefix(&out.smoothed), 23);
    }

    #[test]
    fn stoch_rsi_chain_never_reads_undefined_as_zero() {
        let (_, _, _, close, _) = ohlcv(80);
        let out = stoch_rsi(&close, 14, 14, 3, 3);
        // rsi defined from 14, raw from 27, k from 29, d from 31
        assert_eq!(undefined_prefix(&out.k), 29);
        assert_eq!(undefined_prefix(&out.d), 31);
        assert!(out.k[29..].iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn cmo_of_rising_series_is_100() {
        let src: Vec<f64> = (0..10).map(f64::from).collect();
        let out = cmo(&src, 4);
        assert_eq!(undefined_prefix(&out), 4);
        assert!(out[4..].iter().all(|v| *v == 100.0));
    }

    #[test]
    fn roc_guards_zero_base() {
        let out = roc(&[0.0, 5.0, 10.0], 1);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 100.0);
    }

    #[test]
    fn oscillators_respect_warmup() {
        let (_, high, low, close, _) = ohlcv(150);
        assert_eq!(undefined_prefix(&ultimate_oscillator(&high, &low, &close, 7, 14, 28)), 28);
        assert_eq!(undefined_prefix(&awesome_oscillator(&high, &low, 5, 34)), 33);
        assert_eq!(
            undefined_prefix(&accelerator_oscillator(&high, &low, 5, 34, 5)),
            37
        );
        let tsi = tsi(&close, 25, 13, 13);
        assert_eq!(undefined_prefix(&tsi.value), 1 + 24 + 12);
        assert_eq!(undefined_prefix(&tsi.signal), 1 + 24 + 12 + 12);
        let kst = kst(&close, 9);
        assert_eq!(undefined_prefix(&kst.value), 44);
        assert_eq!(undefined_prefix(&kst.signal), 52);
        assert!(undefined_prefix(&stc(&close, 23, 50, 10, 0.5)) >= 49);
    }

    #[test]
    fn stc_is_bounded() {
        let (_, _, _, close, _) = ohlcv(150);
        let out = stc(&close, 23, 50, 10, 0.5);
        assert!(out.iter().filter(|v| is_defined(**v)).all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn short_inputs_are_undefined() {
        let (_, high, low, close, _) = ohlcv(5);
        assert!(ultimate_oscillator(&high, &low, &close, 7, 14, 28)
            .iter()
            .all(|v| v.is_nan()));
        assert!(tsi(&close, 25, 13, 13).value.iter().all(|v| v.is_nan()));
        assert!(kst(&close, 9).signal.iter().all(|v| v.is_nan()));
    }
}

use crate::indicators::moving_average::{ema, sma, smma};
use crate::indicators::{
    combine, highest, is_defined, lowest, mean, rolling, shift_forward, Record, Series, UNDEFINED,
};

/// Upper/middle/lower envelope around price.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

impl Record for Bands {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("upper", self.upper),
            ("middle", self.middle),
            ("lower", self.lower),
        ]
    }
}

// ============================================================================
// Standard Deviation
// ============================================================================
/// Rolling population standard deviation.
pub fn stdev(src: &[f64], period: usize) -> Series {
    rolling(src, period, |window| {
        let avg = mean(window);
        (window.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / window.len() as f64).sqrt()
    })
}

// ============================================================================
// Bollinger Bands
// ============================================================================
/// Bollinger Bands: `sma ± multiplier * stdev`.
pub fn bollinger(src: &[f64], period: usize, multiplier: f64) -> Bands {
    let middle = sma(src, period);
    let deviation = stdev(src, period);
    let upper = combine(&middle, &deviation, |m, d| m + multiplier * d);
    let lower = combine(&middle, &deviation, |m, d| m - multiplier * d);
    Bands {
        upper,
        middle,
        lower,
    }
}

/// Bollinger %B: position of price inside the bands. Zero width reads 0.5.
pub fn bollinger_percent_b(src: &[f64], period: usize, multiplier: f64) -> Series {
    let bands = bollinger(src, period, multiplier);
    (0..src.len())
        .map(|i| {
            let (u, l) = (bands.upper[i], bands.lower[i]);
            if !(is_defined(u) && is_defined(l) && is_defined(src[i])) {
                return UNDEFINED;
            }
            if u == l {
                0.5
            } else {
                (src[i] - l) / (u - l)
            }
        })
        .collect()
}

/// Bollinger bandwidth: `(upper - lower) / middle`. A zero middle reads 0.
pub fn bollinger_bandwidth(src: &[f64], period: usize, multiplier: f64) -> Series {
    let bands = bollinger(src, period, multiplier);
    let width = combine(&bands.upper, &bands.lower, |u, l| u - l);
    combine(&width, &bands.middle, |w, m| if m == 0.0 { 0.0 } else { w / m })
}

// ============================================================================
// ATR
// ============================================================================
/// True range. The first bar has no previous close and uses `high - low`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Series {
    let len = high.len().min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                return range;
            }
            let prev = close[i - 1];
            range
                .max((high[i] - prev).abs())
                .max((low[i] - prev).abs())
        })
        .collect()
}

/// Average True Range (Wilder smoothing of the true range).
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    smma(&true_range(high, low, close), period)
}

// ============================================================================
// Keltner Channels
// ============================================================================
/// Keltner Channels: `ema(close, period) ± multiplier * atr(atr_period)`.
pub fn keltner(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    multiplier: f64,
    atr_period: usize,
) -> Bands {
    let middle = ema(close, period);
    let range = atr(high, low, close, atr_period);
    let upper = combine(&middle, &range, |m, a| m + multiplier * a);
    let lower = combine(&middle, &range, |m, a| m - multiplier * a);
    Bands {
        upper,
        middle,
        lower,
    }
}

// ============================================================================
// Donchian / Price Channel
// ============================================================================
/// Donchian Channels: rolling highest high, lowest low and their midpoint.
pub fn donchian(high: &[f64], low: &[f64], period: usize) -> Bands {
    let upper = highest(high, period);
    let lower = lowest(low, period);
    let middle = combine(&upper, &lower, |u, l| (u + l) / 2.0);
    Bands {
        upper,
        middle,
        lower,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub upper: Series,
    pub lower: Series,
}

impl Record for Channel {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("upper", self.upper), ("lower", self.lower)]
    }
}

/// Price Channel: the Donchian extremes of the previous `period` bars,
/// excluding the current one, so a close can break out of it.
pub fn price_channel(high: &[f64], low: &[f64], period: usize) -> Channel {
    Channel {
        upper: shift_forward(&highest(high, period), 1),
        lower: shift_forward(&lowest(low, period), 1),
    }
}

// ============================================================================
// Chandelier Exit
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct ChandelierExit {
    pub long: Series,
    pub short: Series,
}

impl Record for ChandelierExit {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("long", self.long), ("short", self.short)]
    }
}

/// Chandelier Exit: ATR trailing stops hung from the period extremes.
pub fn chandelier_exit(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    multiplier: f64,
) -> ChandelierExit {
    let range = atr(high, low, close, period);
    ChandelierExit {
        long: combine(&highest(high, period), &range, |h, a| h - multiplier * a),
        short: combine(&lowest(low, period), &range, |l, a| l + multiplier * a),
    }
}

// ============================================================================
// Chande Kroll Stop
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct KrollStop {
    pub stop_long: Series,
    pub stop_short: Series,
}

impl Record for KrollStop {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("stop_long", self.stop_long), ("stop_short", self.stop_short)]
    }
}

/// Chande Kroll Stop.
///
/// Preliminary stops `highest(high, p) - x * atr` and
/// `lowest(low, p) + x * atr` are re-extremed over `q` bars.
pub fn chande_kroll_stop(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    multiplier: f64,
    stop_period: usize,
) -> KrollStop {
    let range = atr(high, low, close, period);
    let first_high = combine(&highest(high, period), &range, |h, a| h - multiplier * a);
    let first_low = combine(&lowest(low, period), &range, |l, a| l + multiplier * a);
    KrollStop {
        stop_long: lowest(&first_low, stop_period),
        stop_short: highest(&first_high, stop_period),
    }
}

use crate::indicators::momentum::roc;
use crate::indicators::moving_average::{ema, sma, wma};
use crate::indicators::{
    combine, is_defined, mean, rolling, rolling_sum, undefined, Record, Series, UNDEFINED,
};

// ============================================================================
// Elder Ray
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct ElderRay {
    pub bull: Series,
    pub bear: Series,
}

impl Record for ElderRay {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("bull", self.bull), ("bear", self.bear)]
    }
}

/// Elder Ray bull/bear power against an EMA of the close.
pub fn elder_ray(high: &[f64], low: &[f64], close: &[f64], period: usize) -> ElderRay {
    let baseline = ema(close, period);
    ElderRay {
        bull: combine(high, &baseline, |h, e| h - e),
        bear: combine(low, &baseline, |l, e| l - e),
    }
}

// ============================================================================
// DPO
// ============================================================================
/// Detrended Price Oscillator: the close `period / 2 + 1` bars back minus
/// the current SMA.
pub fn dpo(close: &[f64], period: usize) -> Series {
    let average = sma(close, period);
    let lag = period / 2 + 1;
    let mut out = undefined(close.len());
    for i in lag..close.len() {
        if is_defined(close[i - lag]) && is_defined(average[i]) {
            out[i] = close[i - lag] - average[i];
        }
    }
    out
}

// ============================================================================
// Mass Index
// ============================================================================
/// Mass Index: rolling sum of the single/double EMA ratio of the high-low
/// range. A zero double EMA counts as a ratio of 1.
pub fn mass_index(high: &[f64], low: &[f64], ema_period: usize, sum_period: usize) -> Series {
    let range = combine(high, low, |h, l| h - l);
    let single = ema(&range, ema_period);
    let double = ema(&single, ema_period);
    let ratio = combine(&single, &double, |s, d| if d == 0.0 { 1.0 } else { s / d });
    rolling_sum(&ratio, sum_period)
}

// ============================================================================
// Coppock Curve
// ============================================================================
/// Coppock Curve: WMA of the sum of a long and a short rate of change.
pub fn coppock(close: &[f64], long_roc: usize, short_roc: usize, wma_period: usize) -> Series {
    let momentum = combine(&roc(close, long_roc), &roc(close, short_roc), |a, b| a + b);
    wma(&momentum, wma_period)
}

// ============================================================================
// Balance of Power
// ============================================================================
/// `(close - open) / (high - low)`; a zero range reads 0.
pub fn balance_of_power(open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> Series {
    let len = open.len().min(high.len()).min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            let range = high[i] - low[i];
            if range == 0.0 {
                0.0
            } else {
                (close[i] - open[i]) / range
            }
        })
        .collect()
}

// ============================================================================
// Heikin-Ashi
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct HeikinAshi {
    pub open: Series,
    pub high: Series,
    pub low: Series,
    pub close: Series,
}

impl Record for HeikinAshi {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ]
    }
}

/// Heikin-Ashi candles. Each open depends on the previous candle, so the
/// series is rebuilt bar by bar from the first one.
pub fn heikin_ashi(open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> HeikinAshi {
    let len = open.len().min(high.len()).min(low.len()).min(close.len());
    let mut ha = HeikinAshi {
        open: Vec::with_capacity(len),
        high: Vec::with_capacity(len),
        low: Vec::with_capacity(len),
        close: Vec::with_capacity(len),
    };
    for i in 0..len {
        let ha_close = (open[i] + high[i] + low[i] + close[i]) / 4.0;
        let ha_open = if i == 0 {
            (open[0] + close[0]) / 2.0
        } else {
            (ha.open[i - 1] + ha.close[i - 1]) / 2.0
        };
        ha.high.push(high[i].max(ha_open).max(ha_close));
        ha.low.push(low[i].min(ha_open).min(ha_close));
        ha.open.push(ha_open);
        ha.close.push(ha_close);
    }
    ha
}

// ============================================================================
// Pivot Points
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct PivotPoints {
    pub pivot: Series,
    pub r1: Series,
    pub r2: Series,
    pub r3: Series,
    pub s1: Series,
    pub s2: Series,
    pub s3: Series,
}

impl Record for PivotPoints {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("pivot", self.pivot),
            ("r1", self.r1),
            ("r2", self.r2),
            ("r3", self.r3),
            ("s1", self.s1),
            ("s2", self.s2),
            ("s3", self.s3),
        ]
    }
}

/// Classic floor pivots. The levels at index `i` come from bar `i` and apply
/// to the bar that follows it.
pub fn pivot_points(high: &[f64], low: &[f64], close: &[f64]) -> PivotPoints {
    let len = high.len().min(low.len()).min(close.len());
    let mut out = PivotPoints {
        pivot: Vec::with_capacity(len),
        r1: Vec::with_capacity(len),
        r2: Vec::with_capacity(len),
        r3: Vec::with_capacity(len),
        s1: Vec::with_capacity(len),
        s2: Vec::with_capacity(len),
        s3: Vec::with_capacity(len),
    };
    for i in 0..len {
        let (h, l) = (high[i], low[i]);
        let p = (h + l + close[i]) / 3.0;
        out.pivot.push(p);
        out.r1.push(2.0 * p - l);
        out.s1.push(2.0 * p - h);
        out.r2.push(p + (h - l));
        out.s2.push(p - (h - l));
        out.r3.push(h + 2.0 * (p - l));
        out.s3.push(l - 2.0 * (h - p));
    }
    out
}

// ============================================================================
// Fibonacci Retracement
// ============================================================================
/// Retracement levels between the highest high and the lowest low.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fibonacci {
    pub level_0: f64,
    pub level_236: f64,
    pub level_382: f64,
    pub level_500: f64,
    pub level_618: f64,
    pub level_786: f64,
    pub level_1000: f64,
}

impl Fibonacci {
    pub fn levels(&self) -> [(&'static str, f64); 7] {
        [
            ("level_0", self.level_0),
            ("level_236", self.level_236),
            ("level_382", self.level_382),
            ("level_500", self.level_500),
            ("level_618", self.level_618),
            ("level_786", self.level_786),
            ("level_1000", self.level_1000),
        ]
    }
}

/// Levels are measured down from the high: `level_0` is the high and
/// `level_1000` the low. Empty input yields undefined levels.
pub fn fibonacci_retracement(high: &[f64], low: &[f64]) -> Fibonacci {
    let hh = high
        .iter()
        .copied()
        .filter(|v| is_defined(*v))
        .fold(UNDEFINED, f64::max);
    let ll = low
        .iter()
        .copied()
        .filter(|v| is_defined(*v))
        .fold(UNDEFINED, f64::min);
    let level = |ratio: f64| hh - ratio * (hh - ll);
    Fibonacci {
        level_0: level(0.0),
        level_236: level(0.236),
        level_382: level(0.382),
        level_500: level(0.5),
        level_618: level(0.618),
        level_786: level(0.786),
        level_1000: level(1.0),
    }
}

// ============================================================================
// Linear Regression
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    /// Fitted value at the newest bar of each window.
    pub value: Series,
    pub slope: Series,
    pub intercept: Series,
    pub r_squared: Series,
}

impl Record for LinearRegression {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("value", self.value),
            ("slope", self.slope),
            ("intercept", self.intercept),
            ("r_squared", self.r_squared),
        ]
    }
}

/// Least-squares fit over each `period`-bar window with `x = 0..period`.
/// The intercept is at the oldest bar. A flat window has `r_squared = 1`.
pub fn linear_regression(src: &[f64], period: usize) -> LinearRegression {
    let fit = |window: &[f64]| -> (f64, f64, f64) {
        let n = window.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = mean(window);
        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for (i, y) in window.iter().enumerate() {
            let dx = i as f64 - x_mean;
            let dy = y - y_mean;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }
        let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
        let intercept = y_mean - slope * x_mean;
        let r_squared = if syy == 0.0 || sxx == 0.0 {
            1.0
        } else {
            (sxy * sxy) / (sxx * syy)
        };
        (slope, intercept, r_squared)
    };

    let last_x = period.saturating_sub(1) as f64;
    LinearRegression {
        value: rolling(src, period, |w| {
            let (slope, intercept, _) = fit(w);
            intercept + slope * last_x
        }),
        slope: rolling(src, period, |w| fit(w).0),
        intercept: rolling(src, period, |w| fit(w).1),
        r_squared: rolling(src, period, |w| fit(w).2),
    }
}

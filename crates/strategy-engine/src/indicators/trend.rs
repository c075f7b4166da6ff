use crate::indicators::moving_average::{ema, smma};
use crate::indicators::volatility::atr;
use crate::indicators::{
    combine, highest, is_defined, lowest, rolling_sum, shift_back, shift_forward, undefined,
    Record, Series, UNDEFINED,
};

// ============================================================================
// MACD
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

impl Record for Macd {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("macd", self.macd),
            ("signal", self.signal),
            ("histogram", self.histogram),
        ]
    }
}

/// Moving Average Convergence Divergence.
///
/// The signal EMA starts once `slow - 1 + signal - 1` bars have passed.
pub fn macd(src: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let line = combine(&ema(src, fast), &ema(src, slow), |f, s| f - s);
    let signal = ema(&line, signal);
    let histogram = combine(&line, &signal, |m, s| m - s);
    Macd {
        macd: line,
        signal,
        histogram,
    }
}

// ============================================================================
// ADX / DMI
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Adx {
    pub adx: Series,
    pub plus_di: Series,
    pub minus_di: Series,
}

impl Record for Adx {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("adx", self.adx),
            ("plus_di", self.plus_di),
            ("minus_di", self.minus_di),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AdxPhase {
    /// Waiting for the first bar.
    Empty,
    /// Summing the first `period` directional moves and true ranges.
    Accumulate { bars: usize },
    /// DI is live; averaging the first `period` DX values.
    Directional { dx_sum: f64, dx_count: usize },
    /// ADX is Wilder-smoothed from here on.
    Warm { adx: f64 },
}

/// Incremental Wilder ADX. One [`AdxState::next`] call per bar.
#[derive(Debug, Clone)]
pub struct AdxState {
    period: usize,
    prev: (f64, f64, f64),
    plus_dm: f64,
    minus_dm: f64,
    tr: f64,
    phase: AdxPhase,
}

/// DI and (once warm) ADX for a single bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxPoint {
    pub plus_di: f64,
    pub minus_di: f64,
    pub adx: Option<f64>,
}

impl AdxState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: (0.0, 0.0, 0.0),
            plus_dm: 0.0,
            minus_dm: 0.0,
            tr: 0.0,
            phase: AdxPhase::Empty,
        }
    }

    pub fn next(&mut self, high: f64, low: f64, close: f64) -> Option<AdxPoint> {
        if self.period == 0 {
            return None;
        }
        let n = self.period as f64;
        let point = match self.phase {
            AdxPhase::Empty => {
                self.phase = AdxPhase::Accumulate { bars: 0 };
                None
            }
            AdxPhase::Accumulate { bars } => {
                let (plus, minus, tr) = self.moves(high, low);
                self.plus_dm += plus;
                self.minus_dm += minus;
                self.tr += tr;
                let bars = bars + 1;
                if bars < self.period {
                    self.phase = AdxPhase::Accumulate { bars };
                    None
                } else {
                    let (plus_di, minus_di, dx) = self.directional();
                    self.phase = self.advance_dx(dx, 0.0, 0);
                    Some(self.point(plus_di, minus_di))
                }
            }
            AdxPhase::Directional { dx_sum, dx_count } => {
                self.smooth(high, low);
                let (plus_di, minus_di, dx) = self.directional();
                self.phase = self.advance_dx(dx, dx_sum, dx_count);
                Some(self.point(plus_di, minus_di))
            }
            AdxPhase::Warm { adx } => {
                self.smooth(high, low);
                let (plus_di, minus_di, dx) = self.directional();
                self.phase = AdxPhase::Warm {
                    adx: (adx * (n - 1.0) + dx) / n,
                };
                Some(self.point(plus_di, minus_di))
            }
        };
        self.prev = (high, low, close);
        point
    }

    fn advance_dx(&self, dx: f64, dx_sum: f64, dx_count: usize) -> AdxPhase {
        let (dx_sum, dx_count) = (dx_sum + dx, dx_count + 1);
        if dx_count == self.period {
            AdxPhase::Warm {
                adx: dx_sum / self.period as f64,
            }
        } else {
            AdxPhase::Directional { dx_sum, dx_count }
        }
    }

    fn point(&self, plus_di: f64, minus_di: f64) -> AdxPoint {
        let adx = match self.phase {
            AdxPhase::Warm { adx } => Some(adx),
            _ => None,
        };
        AdxPoint {
            plus_di,
            minus_di,
            adx,
        }
    }

    fn moves(&self, high: f64, low: f64) -> (f64, f64, f64) {
        let (prev_high, prev_low, prev_close) = self.prev;
        let up = high - prev_high;
        let down = prev_low - low;
        let plus = if up > down && up > 0.0 { up } else { 0.0 };
        let minus = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        (plus, minus, tr)
    }

    fn smooth(&mut self, high: f64, low: f64) {
        let (plus, minus, tr) = self.moves(high, low);
        let n = self.period as f64;
        self.plus_dm = self.plus_dm - self.plus_dm / n + plus;
        self.minus_dm = self.minus_dm - self.minus_dm / n + minus;
        self.tr = self.tr - self.tr / n + tr;
    }

    fn directional(&self) -> (f64, f64, f64) {
        if self.tr == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let plus_di = 100.0 * self.plus_dm / self.tr;
        let minus_di = 100.0 * self.minus_dm / self.tr;
        let total = plus_di + minus_di;
        let dx = if total == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / total
        };
        (plus_di, minus_di, dx)
    }
}

/// Average Directional Index with +DI/-DI.
///
/// DI is first defined at index `period`, ADX at `2 * period - 1`.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Adx {
    let len = high.len().min(low.len()).min(close.len());
    let mut out = Adx {
        adx: undefined(len),
        plus_di: undefined(len),
        minus_di: undefined(len),
    };
    let mut state = AdxState::new(period);
    for i in 0..len {
        if let Some(point) = state.next(high[i], low[i], close[i]) {
            out.plus_di[i] = point.plus_di;
            out.minus_di[i] = point.minus_di;
            out.adx[i] = point.adx.unwrap_or(UNDEFINED);
        }
    }
    out
}

// ============================================================================
// Aroon
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Aroon {
    pub up: Series,
    pub down: Series,
    pub oscillator: Series,
}

impl Record for Aroon {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("up", self.up),
            ("down", self.down),
            ("oscillator", self.oscillator),
        ]
    }
}

/// Aroon Up/Down over a `period + 1` bar lookback; ties resolve to the most
/// recent extreme.
pub fn aroon(high: &[f64], low: &[f64], period: usize) -> Aroon {
    let len = high.len().min(low.len());
    let mut up = undefined(len);
    let mut down = undefined(len);
    if period > 0 {
        let p = period as f64;
        for i in period..len {
            let start = i - period;
            let mut hi_at = start;
            let mut lo_at = start;
            for j in start..=i {
                if high[j] >= high[hi_at] {
                    hi_at = j;
                }
                if low[j] <= low[lo_at] {
                    lo_at = j;
                }
            }
            up[i] = 100.0 * (p - (i - hi_at) as f64) / p;
            down[i] = 100.0 * (p - (i - lo_at) as f64) / p;
        }
    }
    let oscillator = combine(&up, &down, |u, d| u - d);
    Aroon {
        up,
        down,
        oscillator,
    }
}

// ============================================================================
// Parabolic SAR
// ============================================================================
#[derive(Debug, Clone, Copy)]
struct SarState {
    rising: bool,
    sar: f64,
    extreme: f64,
    af: f64,
}

/// Parabolic Stop and Reverse.
///
/// The first bar only seeds the trend; output starts at index 1.
pub fn parabolic_sar(high: &[f64], low: &[f64], step: f64, max_step: f64) -> Series {
    let len = high.len().min(low.len());
    let mut out = undefined(len);
    if len < 2 {
        return out;
    }

    let rising = high[1] + low[1] >= high[0] + low[0];
    let mut state = SarState {
        rising,
        sar: if rising { low[0] } else { high[0] },
        extreme: if rising {
            high[0].max(high[1])
        } else {
            low[0].min(low[1])
        },
        af: step,
    };
    out[1] = state.sar;

    for i in 2..len {
        let mut sar = state.sar + state.af * (state.extreme - state.sar);
        if state.rising {
            sar = sar.min(low[i - 1]).min(low[i - 2]);
            if low[i] < sar {
                state = SarState {
                    rising: false,
                    sar: state.extreme,
                    extreme: low[i],
                    af: step,
                };
            } else {
                if high[i] > state.extreme {
                    state.extreme = high[i];
                    state.af = (state.af + step).min(max_step);
                }
                state.sar = sar;
            }
        } else {
            sar = sar.max(high[i - 1]).max(high[i - 2]);
            if high[i] > sar {
                state = SarState {
                    rising: true,
                    sar: state.extreme,
                    extreme: high[i],
                    af: step,
                };
            } else {
                if low[i] < state.extreme {
                    state.extreme = low[i];
                    state.af = (state.af + step).min(max_step);
                }
                state.sar = sar;
            }
        }
        out[i] = state.sar;
    }
    out
}

// ============================================================================
// Supertrend
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Supertrend {
    pub supertrend: Series,
    /// `1.0` while the trend is up, `-1.0` while it is down.
    pub direction: Series,
}

impl Record for Supertrend {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("supertrend", self.supertrend),
            ("direction", self.direction),
        ]
    }
}

/// Supertrend: ATR bands around the median price that only ratchet toward
/// price until the close crosses them.
pub fn supertrend(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    multiplier: f64,
) -> Supertrend {
    let len = high.len().min(low.len()).min(close.len());
    let range = atr(high, low, close, period);
    let mut out = Supertrend {
        supertrend: undefined(len),
        direction: undefined(len),
    };

    // (final upper, final lower, direction)
    let mut carried: Option<(f64, f64, f64)> = None;
    for i in 0..len {
        if !is_defined(range[i]) {
            continue;
        }
        let mid = (high[i] + low[i]) / 2.0;
        let basic_upper = mid + multiplier * range[i];
        let basic_lower = mid - multiplier * range[i];

        let (upper, lower, direction) = match carried {
            None => (basic_upper, basic_lower, 1.0),
            Some((prev_upper, prev_lower, prev_direction)) => {
                let prev_close = close[i - 1];
                let upper = if basic_upper < prev_upper || prev_close > prev_upper {
                    basic_upper
                } else {
                    prev_upper
                };
                let lower = if basic_lower > prev_lower || prev_close < prev_lower {
                    basic_lower
                } else {
                    prev_lower
                };
                let direction = if prev_direction > 0.0 && close[i] < lower {
                    -1.0
                } else if prev_direction < 0.0 && close[i] > upper {
                    1.0
                } else {
                    prev_direction
                };
                (upper, lower, direction)
            }
        };

        out.supertrend[i] = if direction > 0.0 { lower } else { upper };
        out.direction[i] = direction;
        carried = Some((upper, lower, direction));
    }
    out
}

// ============================================================================
// Vortex
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Vortex {
    pub plus: Series,
    pub minus: Series,
}

impl Record for Vortex {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("plus", self.plus), ("minus", self.minus)]
    }
}

/// Vortex Indicator (VI+ / VI-). Output starts at index `period`.
pub fn vortex(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vortex {
    let len = high.len().min(low.len()).min(close.len());
    let mut vm_plus = undefined(len);
    let mut vm_minus = undefined(len);
    let mut tr = undefined(len);
    for i in 1..len {
        vm_plus[i] = (high[i] - low[i - 1]).abs();
        vm_minus[i] = (low[i] - high[i - 1]).abs();
        tr[i] = (high[i] - low[i])
            .max((high[i] - close[i - 1]).abs())
            .max((low[i] - close[i - 1]).abs());
    }
    let tr_sum = rolling_sum(&tr, period);
    let ratio = |a: f64, t: f64| if t == 0.0 { 0.0 } else { a / t };
    Vortex {
        plus: combine(&rolling_sum(&vm_plus, period), &tr_sum, ratio),
        minus: combine(&rolling_sum(&vm_minus, period), &tr_sum, ratio),
    }
}

// ============================================================================
// Ichimoku
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Ichimoku {
    pub tenkan: Series,
    pub kijun: Series,
    pub senkou_a: Series,
    pub senkou_b: Series,
    pub chikou: Series,
}

impl Record for Ichimoku {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![
            ("tenkan", self.tenkan),
            ("kijun", self.kijun),
            ("senkou_a", self.senkou_a),
            ("senkou_b", self.senkou_b),
            ("chikou", self.chikou),
        ]
    }
}

fn midpoint(high: &[f64], low: &[f64], period: usize) -> Series {
    combine(&highest(high, period), &lowest(low, period), |h, l| {
        (h + l) / 2.0
    })
}

/// Ichimoku Kinko Hyo.
///
/// Both senkou spans project `kijun_period` bars forward and the chikou span
/// lags the close by the same displacement. Projections past the last bar
/// are dropped so every line keeps the input length.
pub fn ichimoku(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    tenkan_period: usize,
    kijun_period: usize,
    senkou_period: usize,
) -> Ichimoku {
    let tenkan = midpoint(high, low, tenkan_period);
    let kijun = midpoint(high, low, kijun_period);
    let span_a = combine(&tenkan, &kijun, |t, k| (t + k) / 2.0);
    let span_b = midpoint(high, low, senkou_period);
    Ichimoku {
        senkou_a: shift_forward(&span_a, kijun_period),
        senkou_b: shift_forward(&span_b, kijun_period),
        chikou: shift_back(close, kijun_period),
        tenkan,
        kijun,
    }
}

// ============================================================================
// Williams Alligator
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Alligator {
    pub jaw: Series,
    pub teeth: Series,
    pub lips: Series,
}

impl Record for Alligator {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("jaw", self.jaw), ("teeth", self.teeth), ("lips", self.lips)]
    }
}

/// Williams Alligator: SMMA 13/8/5 of the median price shifted forward
/// 8/5/3 bars.
pub fn alligator(high: &[f64], low: &[f64]) -> Alligator {
    let median = combine(high, low, |h, l| (h + l) / 2.0);
    Alligator {
        jaw: shift_forward(&smma(&median, 13), 8),
        teeth: shift_forward(&smma(&median, 8), 5),
        lips: shift_forward(&smma(&median, 5), 3),
    }
}

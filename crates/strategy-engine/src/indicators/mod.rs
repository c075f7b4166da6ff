//! Technical indicator library.
//!
//! Every indicator is a pure function over price/volume series. Outputs have
//! the same length as their input; positions without enough history hold
//! [`UNDEFINED`] and are never filled from a partial window. Inputs shorter
//! than an indicator's minimum length yield an all-undefined result.

pub mod composite;
pub mod momentum;
pub mod moving_average;
pub mod trend;
pub mod volatility;
pub mod volume;

/// A derived series, index-aligned with its source.
pub type Series = Vec<f64>;

/// Sentinel for positions that have no value yet.
pub const UNDEFINED: f64 = f64::NAN;

/// Multi-output indicators expose their series as ordered `(name, series)`
/// pairs so callers can address them by key.
pub trait Record {
    fn fields(self) -> Vec<(&'static str, Series)>;
}

#[inline]
pub fn is_defined(value: f64) -> bool {
    !value.is_nan()
}

/// Series of `len` undefined values.
pub fn undefined(len: usize) -> Series {
    vec![UNDEFINED; len]
}

/// Start index of the first run of `period` consecutive defined values.
pub(crate) fn first_full_window(src: &[f64], period: usize) -> Option<usize> {
    if period == 0 {
        return None;
    }
    let mut run = 0;
    for (i, &value) in src.iter().enumerate() {
        if is_defined(value) {
            run += 1;
            if run == period {
                return Some(i + 1 - period);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Applies `f` to every full window ending at each index. Windows that
/// contain an undefined value produce an undefined output.
pub(crate) fn rolling<F>(src: &[f64], period: usize, f: F) -> Series
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = undefined(src.len());
    if period == 0 || src.len() < period {
        return out;
    }
    for end in period - 1..src.len() {
        let window = &src[end + 1 - period..=end];
        if window.iter().all(|v| is_defined(*v)) {
            out[end] = f(window);
        }
    }
    out
}

pub(crate) fn rolling_sum(src: &[f64], period: usize) -> Series {
    rolling(src, period, |w| w.iter().sum())
}

pub(crate) fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

/// Element-wise combination of two aligned series; undefined if either side is.
pub(crate) fn combine<F>(a: &[f64], b: &[f64], f: F) -> Series
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            if is_defined(x) && is_defined(y) {
                f(x, y)
            } else {
                UNDEFINED
            }
        })
        .collect()
}

/// Element-wise map that keeps undefined positions undefined.
pub(crate) fn map_defined<F>(src: &[f64], f: F) -> Series
where
    F: Fn(f64) -> f64,
{
    src.iter()
        .map(|&x| if is_defined(x) { f(x) } else { UNDEFINED })
        .collect()
}

/// `out[i] = src[i - n]`: moves values `n` bars into the future.
pub(crate) fn shift_forward(src: &[f64], n: usize) -> Series {
    let mut out = undefined(src.len());
    for i in n..src.len() {
        out[i] = src[i - n];
    }
    out
}

/// `out[i] = src[i + n]`: moves values `n` bars into the past.
pub(crate) fn shift_back(src: &[f64], n: usize) -> Series {
    let mut out = undefined(src.len());
    for i in 0..src.len().saturating_sub(n) {
        out[i] = src[i + n];
    }
    out
}

/// One-bar changes, `out[0]` undefined.
pub(crate) fn changes(src: &[f64]) -> Series {
    let mut out = undefined(src.len());
    for i in 1..src.len() {
        if is_defined(src[i]) && is_defined(src[i - 1]) {
            out[i] = src[i] - src[i - 1];
        }
    }
    out
}

/// Rolling maximum over `period` bars.
pub fn highest(src: &[f64], period: usize) -> Series {
    rolling(src, period, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

/// Rolling minimum over `period` bars.
pub fn lowest(src: &[f64], period: usize) -> Series {
    rolling(src, period, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

/// True when `a` crossed above `b` on the latest bar.
pub fn crossover(a: &[f64], b: &[f64]) -> bool {
    latest_pair(a, b).is_some_and(|(prev_a, prev_b, a, b)| prev_a <= prev_b && a > b)
}

/// True when `a` crossed below `b` on the latest bar.
pub fn crossunder(a: &[f64], b: &[f64]) -> bool {
    latest_pair(a, b).is_some_and(|(prev_a, prev_b, a, b)| prev_a >= prev_b && a < b)
}

/// Per-bar crossover flags; bars with undefined inputs are `false`.
pub fn crossovers(a: &[f64], b: &[f64]) -> Vec<bool> {
    cross_flags(a, b, |pa, pb, a, b| pa <= pb && a > b)
}

/// Per-bar crossunder flags; bars with undefined inputs are `false`.
pub fn crossunders(a: &[f64], b: &[f64]) -> Vec<bool> {
    cross_flags(a, b, |pa, pb, a, b| pa >= pb && a < b)
}

fn cross_flags<F>(a: &[f64], b: &[f64], f: F) -> Vec<bool>
where
    F: Fn(f64, f64, f64, f64) -> bool,
{
    let len = a.len().min(b.len());
    let mut out = vec![false; len];
    for i in 1..len {
        let values = [a[i - 1], b[i - 1], a[i], b[i]];
        if values.iter().all(|v| is_defined(*v)) {
            out[i] = f(a[i - 1], b[i - 1], a[i], b[i]);
        }
    }
    out
}

fn latest_pair(a: &[f64], b: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let len = a.len().min(b.len());
    if len < 2 {
        return None;
    }
    let values = (a[len - 2], b[len - 2], a[len - 1], b[len - 1]);
    let defined = [values.0, values.1, values.2, values.3]
        .iter()
        .all(|v| is_defined(*v));
    defined.then_some(values)
}

pub mod prelude {
    pub use super::composite::*;
    pub use super::momentum::*;
    pub use super::moving_average::*;
    pub use super::trend::*;
    pub use super::volatility::*;
    pub use super::volume::*;
    pub use super::{
        crossover, crossovers, crossunder, crossunders, highest, lowest, Record, Series,
        UNDEFINED,
    };
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::is_defined;

    /// Asserts equality treating undefined positions as equal and comparing
    /// defined values within `eps`.
    pub fn assert_series_close(actual: &[f64], expected: &[f64], eps: f64) {
        assert_eq!(actual.len(), expected.len(), "length mismatch");
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            match (is_defined(*a), is_defined(*e)) {
                (false, false) => {}
                (true, true) => assert!(
                    (a - e).abs() <= eps,
                    "index {i}: expected {e}, got {a}"
                ),
                _ => panic!("index {i}: expected {e}, got {a}"),
            }
        }
    }

    pub fn undefined_prefix(series: &[f64]) -> usize {
        series.iter().take_while(|v| !is_defined(**v)).count()
    }

    /// A deterministic, gently trending OHLCV fixture.
    pub fn ohlcv(len: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut open = Vec::with_capacity(len);
        let mut high = Vec::with_capacity(len);
        let mut low = Vec::with_capacity(len);
        let mut close = Vec::with_capacity(len);
        let mut volume = Vec::with_capacity(len);
        for i in 0..len {
            let t = i as f64;
            let mid = 100.0 + t * 0.5 + (t * 0.7).sin() * 3.0;
            open.push(mid - 0.4);
            close.push(mid + 0.4 * (t * 1.3).cos());
            high.push(mid + 1.5 + (t * 0.3).sin().abs());
            low.push(mid - 1.5 - (t * 0.2).cos().abs());
            volume.push(1_000.0 + (t * 0.9).sin() * 250.0 + t * 10.0);
        }
        (open, high, low, close, volume)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn rolling_skips_windows_with_undefined_values() {
        let src = [UNDEFINED, 1.0, 2.0, 3.0, 4.0];
        let sums = rolling_sum(&src, 2);
        assert_series_close(&sums, &[UNDEFINED, UNDEFINED, 3.0, 5.0, 7.0], 1e-12);
    }

    #[test]
    fn first_full_window_resets_on_gaps() {
        let src = [1.0, UNDEFINED, 2.0, 3.0, 4.0];
        assert_eq!(first_full_window(&src, 3), Some(2));
        assert_eq!(first_full_window(&src, 4), None);
    }

    #[test]
    fn highest_and_lowest_track_window_extremes() {
        let src = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0];
        assert_series_close(
            &highest(&src, 3),
            &[UNDEFINED, UNDEFINED, 4.0, 4.0, 5.0, 9.0, 9.0],
            0.0,
        );
        assert_series_close(
            &lowest(&src, 3),
            &[UNDEFINED, UNDEFINED, 1.0, 1.0, 1.0, 1.0, 2.0],
            0.0,
        );
    }

    #[test]
    fn crossover_detects_latest_bar_only() {
        let fast = [1.0, 2.0, 4.0];
        let slow = [2.0, 3.0, 3.0];
        assert!(crossover(&fast, &slow));
        assert!(!crossunder(&fast, &slow));
        assert!(crossunder(&slow, &fast));
        assert_eq!(crossovers(&fast, &slow), vec![false, false, true]);
    }

    #[test]
    fn crossover_is_false_for_short_or_undefined_input() {
        assert!(!crossover(&[1.0], &[0.0]));
        assert!(!crossover(&[UNDEFINED, 2.0], &[1.0, 1.0]));
        assert!(!crossunder(&[], &[]));
    }

    #[test]
    fn shifts_keep_length() {
        let src = [1.0, 2.0, 3.0];
        assert_series_close(&shift_forward(&src, 1), &[UNDEFINED, 1.0, 2.0], 0.0);
        assert_series_close(&shift_back(&src, 2), &[3.0, UNDEFINED, UNDEFINED], 0.0);
        assert_eq!(shift_back(&src, 5).len(), 3);
    }
}

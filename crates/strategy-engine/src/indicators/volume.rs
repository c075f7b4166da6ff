use crate::indicators::momentum::typical_price;
use crate::indicators::moving_average::{ema, sma};
use crate::indicators::{
    changes, combine, is_defined, rolling_sum, undefined, Record, Series, UNDEFINED,
};

// ============================================================================
// OBV
// ============================================================================
/// On-Balance Volume, starting from 0 at the first bar.
pub fn obv(close: &[f64], volume: &[f64]) -> Series {
    let len = close.len().min(volume.len());
    let mut out = undefined(len);
    if len == 0 {
        return out;
    }
    let mut total = 0.0;
    out[0] = total;
    for i in 1..len {
        if close[i] > close[i - 1] {
            total += volume[i];
        } else if close[i] < close[i - 1] {
            total -= volume[i];
        }
        out[i] = total;
    }
    out
}

// ============================================================================
// VWAP
// ============================================================================
/// Cumulative volume-weighted average of the typical price. Stays undefined
/// until some volume has traded.
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Series {
    let tp = typical_price(high, low, close);
    let mut out = undefined(tp.len().min(volume.len()));
    let (mut pv, mut vol) = (0.0, 0.0);
    for i in 0..out.len() {
        pv += tp[i] * volume[i];
        vol += volume[i];
        if vol != 0.0 {
            out[i] = pv / vol;
        }
    }
    out
}

// ============================================================================
// MFI
// ============================================================================
/// Money Flow Index: a volume-weighted RSI over the typical price.
///
/// Output starts at index `period`. No negative flow reads 100, and no flow
/// in either direction reads 50.
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Series {
    let tp = typical_price(high, low, close);
    let len = tp.len().min(volume.len());
    let mut positive = undefined(len);
    let mut negative = undefined(len);
    for i in 1..len {
        let flow = tp[i] * volume[i];
        let (pos, neg) = if tp[i] > tp[i - 1] {
            (flow, 0.0)
        } else if tp[i] < tp[i - 1] {
            (0.0, flow)
        } else {
            (0.0, 0.0)
        };
        positive[i] = pos;
        negative[i] = neg;
    }
    combine(
        &rolling_sum(&positive, period),
        &rolling_sum(&negative, period),
        |pos, neg| {
            if neg == 0.0 {
                if pos == 0.0 {
                    50.0
                } else {
                    100.0
                }
            } else {
                100.0 - 100.0 / (1.0 + pos / neg)
            }
        },
    )
}

// ============================================================================
// Accumulation / Distribution
// ============================================================================
/// Close location value, `((c - l) - (h - c)) / (h - l)`; a zero range reads 0.
fn close_location(high: &[f64], low: &[f64], close: &[f64]) -> Series {
    let len = high.len().min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            let range = high[i] - low[i];
            if range == 0.0 {
                0.0
            } else {
                ((close[i] - low[i]) - (high[i] - close[i])) / range
            }
        })
        .collect()
}

/// Accumulation/Distribution line: running sum of `clv * volume`.
pub fn accumulation_distribution(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
) -> Series {
    let clv = close_location(high, low, close);
    let mut running = 0.0;
    clv.iter()
        .zip(volume)
        .map(|(c, v)| {
            running += c * v;
            running
        })
        .collect()
}

/// Chaikin Oscillator: `ema(ad, fast) - ema(ad, slow)`.
pub fn chaikin_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    fast: usize,
    slow: usize,
) -> Series {
    let ad = accumulation_distribution(high, low, close, volume);
    combine(&ema(&ad, fast), &ema(&ad, slow), |f, s| f - s)
}

/// Chaikin Money Flow over `period` bars. Zero volume reads 0.
pub fn chaikin_money_flow(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    period: usize,
) -> Series {
    let flow: Series = close_location(high, low, close)
        .iter()
        .zip(volume)
        .map(|(c, v)| c * v)
        .collect();
    combine(
        &rolling_sum(&flow, period),
        &rolling_sum(volume, period),
        |f, v| if v == 0.0 { 0.0 } else { f / v },
    )
}

// ============================================================================
// Force Index
// ============================================================================
fn raw_force(close: &[f64], volume: &[f64]) -> Series {
    combine(&changes(close), volume, |change, v| change * v)
}

/// Force Index: EMA of `close change * volume`. Output starts at `period`.
pub fn force_index(close: &[f64], volume: &[f64], period: usize) -> Series {
    ema(&raw_force(close, volume), period)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElderForce {
    pub short: Series,
    pub long: Series,
}

impl Record for ElderForce {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("short", self.short), ("long", self.long)]
    }
}

/// Elder's dual-period Force Index (2 and 13 bars by default).
pub fn elder_force_index(
    close: &[f64],
    volume: &[f64],
    short: usize,
    long: usize,
) -> ElderForce {
    let raw = raw_force(close, volume);
    ElderForce {
        short: ema(&raw, short),
        long: ema(&raw, long),
    }
}

// ============================================================================
// Ease of Movement
// ============================================================================
/// Volume scale applied to the box ratio.
pub const EMV_DIVISOR: f64 = 100_000_000.0;

/// Ease of Movement, SMA-smoothed over `period`.
pub fn ease_of_movement(high: &[f64], low: &[f64], volume: &[f64], period: usize) -> Series {
    let len = high.len().min(low.len()).min(volume.len());
    let mut raw = undefined(len);
    for i in 1..len {
        let distance = (high[i] + low[i]) / 2.0 - (high[i - 1] + low[i - 1]) / 2.0;
        let range = high[i] - low[i];
        raw[i] = if range == 0.0 || volume[i] == 0.0 {
            0.0
        } else {
            distance / ((volume[i] / EMV_DIVISOR) / range)
        };
    }
    sma(&raw, period)
}

// ============================================================================
// Klinger Oscillator
// ============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct Klinger {
    pub kvo: Series,
    pub signal: Series,
}

impl Record for Klinger {
    fn fields(self) -> Vec<(&'static str, Series)> {
        vec![("kvo", self.kvo), ("signal", self.signal)]
    }
}

/// Klinger Volume Oscillator.
///
/// Volume is signed by the direction of the typical price, then
/// `kvo = ema(fast) - ema(slow)` with an EMA signal line.
pub fn klinger(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Klinger {
    let trend = changes(&typical_price(high, low, close));
    let signed = combine(&trend, volume, |t, v| if t >= 0.0 { v } else { -v });
    let kvo = combine(&ema(&signed, fast), &ema(&signed, slow), |f, s| f - s);
    let signal = ema(&kvo, signal);
    Klinger { kvo, signal }
}

// ============================================================================
// Volume Oscillator
// ============================================================================
/// Percentage spread between a fast and a slow volume EMA. A zero slow
/// average reads 0.
pub fn volume_oscillator(volume: &[f64], fast: usize, slow: usize) -> Series {
    combine(&ema(volume, fast), &ema(volume, slow), |f, s| {
        if s == 0.0 {
            0.0
        } else {
            100.0 * (f - s) / s
        }
    })
}

// ============================================================================
// Volume Profile
// ============================================================================
/// Volume traded per price bucket, buckets ordered by ascending price.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    /// Mid-price of each bucket.
    pub prices: Series,
    pub volumes: Series,
    /// Point of control: mid-price of the bucket with the most volume.
    pub poc: f64,
}

impl VolumeProfile {
    fn empty() -> Self {
        Self {
            prices: Vec::new(),
            volumes: Vec::new(),
            poc: UNDEFINED,
        }
    }
}

/// Buckets closes into `rows` equal-width price bands and sums the volume
/// in each. A flat price range collapses to a single bucket, and there are
/// never more buckets than priced points.
pub fn volume_profile(close: &[f64], volume: &[f64], rows: usize) -> VolumeProfile {
    let points: Vec<(f64, f64)> = close
        .iter()
        .zip(volume)
        .filter(|(c, v)| is_defined(**c) && is_defined(**v))
        .map(|(c, v)| (*c, *v))
        .collect();
    if rows == 0 || points.is_empty() {
        return VolumeProfile::empty();
    }

    let min = points.iter().map(|p| p.0).fold(f64::MAX, f64::min);
    let max = points.iter().map(|p| p.0).fold(f64::MIN, f64::max);
    if max == min {
        let total = points.iter().map(|p| p.1).sum();
        return VolumeProfile {
            prices: vec![min],
            volumes: vec![total],
            poc: min,
        };
    }

    let rows = rows.min(points.len());
    let width = (max - min) / rows as f64;
    let mut volumes = vec![0.0; rows];
    for (price, vol) in points {
        let bucket = (((price - min) / width) as usize).min(rows - 1);
        volumes[bucket] += vol;
    }
    let prices: Series = (0..rows)
        .map(|k| min + width * (k as f64 + 0.5))
        .collect();

    let mut poc_index = 0;
    for (k, v) in volumes.iter().enumerate() {
        if *v > volumes[poc_index] {
            poc_index = k;
        }
    }
    VolumeProfile {
        poc: prices[poc_index],
        prices,
        volumes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::*;

    #[test]
    fn obv_accumulates_signed_volume() {
        let close = [10.0, 11.0, 11.0, 9.0];
        let volume = [100.0, 200.0, 300.0, 50.0];
        assert_eq!(obv(&close, &volume), vec![0.0, 200.0, 200.0, 150.0]);
    }

    #[test]
    fn vwap_waits_for_volume() {
        let p = [10.0, 10.0, 13.0];
        let v = [0.0, 2.0, 1.0];
        let out = vwap(&p, &p, &p, &v);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 10.0);
        assert!((out[2] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn mfi_without_outflow_is_100() {
        let rising: Vec<f64> = (0..20).map(|i| 10.0 + f64::from(i)).collect();
        let volume = vec![5.0; 20];
        let out = mfi(&rising, &rising, &rising, &volume, 14);
        assert_eq!(undefined_prefix(&out), 14);
        assert!(out[14..].iter().all(|v| *v == 100.0));

        let flat = vec![10.0; 20];
        let out = mfi(&flat, &flat, &flat, &volume, 14);
        assert!(out[14..].iter().all(|v| *v == 50.0));
    }

    #[test]
    fn accumulation_distribution_guards_zero_range() {
        let high = [10.0, 12.0];
        let low = [10.0, 10.0];
        let close = [10.0, 12.0];
        let volume = [100.0, 50.0];
        assert_eq!(
            accumulation_distribution(&high, &low, &close, &volume),
            vec![0.0, 50.0]
        );
    }

    #[test]
    fn money_flow_family_respects_warmup() {
        let (_, high, low, close, volume) = ohlcv(80);
        assert_eq!(undefined_prefix(&chaikin_oscillator(&high, &low, &close, &volume, 3, 10)), 9);
        assert_eq!(undefined_prefix(&chaikin_money_flow(&high, &low, &close, &volume, 20)), 19);
        assert_eq!(undefined_prefix(&force_index(&close, &volume, 13)), 13);
        let elder = elder_force_index(&close, &volume, 2, 13);
        assert_eq!(undefined_prefix(&elder.short), 2);
        assert_eq!(undefined_prefix(&elder.long), 13);
        assert_eq!(undefined_prefix(&ease_of_movement(&high, &low, &volume, 14)), 14);
        let k = klinger(&high, &low, &close, &volume, 34, 55, 13);
        assert_eq!(undefined_prefix(&k.kvo), 55);
        assert_eq!(undefined_prefix(&k.signal), 67);
        assert_eq!(undefined_prefix(&volume_oscillator(&volume, 5, 10)), 9);
    }

    #[test]
    fn chaikin_money_flow_is_bounded() {
        let (_, high, low, close, volume) = ohlcv(60);
        let out = chaikin_money_flow(&high, &low, &close, &volume, 20);
        assert!(out[19..].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn volume_profile_buckets_by_price() {
        let close = [10.0, 10.5, 19.0, 20.0, 20.0];
        let volume = [1.0, 1.0, 2.0, 5.0, 1.0];
        let profile = volume_profile(&close, &volume, 2);
        assert_eq!(profile.prices, vec![12.5, 17.5]);
        assert_eq!(profile.volumes, vec![2.0, 8.0]);
        assert_eq!(profile.poc, 17.5);
    }

    #[test]
    fn volume_profile_edge_cases() {
        assert!(volume_profile(&[], &[], 12).prices.is_empty());
        assert!(volume_profile(&[1.0], &[1.0], 0).poc.is_nan());
        let flat = volume_profile(&[5.0, 5.0], &[1.0, 2.0], 12);
        assert_eq!(flat.prices, vec![5.0]);
        assert_eq!(flat.volumes, vec![3.0]);
    }

    #[test]
    fn volume_profile_rows_are_capped_by_points() {
        let close = [10.0, 12.0, 14.0];
        let volume = [1.0, 2.0, 3.0];
        let profile = volume_profile(&close, &volume, usize::MAX / 2);
        assert_eq!(profile.prices.len(), 3);
        assert_eq!(profile.volumes.iter().sum::<f64>(), 6.0);
        assert_eq!(profile.poc, profile.prices[2]);
    }
}

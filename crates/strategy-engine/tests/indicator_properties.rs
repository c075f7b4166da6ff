use strategy_engine::indicators::prelude::*;
use strategy_engine::indicators::is_defined;
use strategy_engine::{BuiltinRegistry, ScriptValue};

type Single = fn(&Ohlcv, usize) -> Series;

struct Ohlcv {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

fn ohlcv(len: usize) -> Ohlcv {
    let mut bars = Ohlcv {
        open: Vec::with_capacity(len),
        high: Vec::with_capacity(len),
        low: Vec::with_capacity(len),
        close: Vec::with_capacity(len),
        volume: Vec::with_capacity(len),
    };
    for i in 0..len {
        let t = i as f64;
        let mid = 50.0 + t * 0.3 + (t * 0.45).sin() * 4.0;
        bars.open.push(mid - 0.3);
        bars.close.push(mid + (t * 1.1).cos() * 0.6);
        bars.high.push(mid + 1.2 + (t * 0.25).sin().abs());
        bars.low.push(mid - 1.2 - (t * 0.35).cos().abs());
        bars.volume.push(800.0 + (t * 0.8).sin() * 200.0 + t * 5.0);
    }
    bars
}

/// Period-parameterised indicators and the number of leading bars each
/// leaves undefined beyond `period - 1`.
fn period_indicators() -> Vec<(&'static str, Single, usize)> {
    vec![
        entry("sma", |b, p| sma(&b.close, p), 0),
        entry("ema", |b, p| ema(&b.close, p), 0),
        entry("wma", |b, p| wma(&b.close, p), 0),
        entry("smma", |b, p| smma(&b.close, p), 0),
        entry("hma", |b, p| hma(&b.close, p), 0),
        entry("alma", |b, p| alma(&b.close, p, 0.85, 6.0), 0),
        entry("tema", |b, p| tema(&b.close, p), 0),
        entry("kama", |b, p| kama(&b.close, p, 2, 30), 0),
        entry("rsi", |b, p| rsi(&b.close, p), 1),
        entry("cci", |b, p| cci(&b.high, &b.low, &b.close, p), 0),
        entry("williams_r", |b, p| williams_r(&b.high, &b.low, &b.close, p), 0),
        entry("cmo", |b, p| cmo(&b.close, p), 1),
        entry("roc", |b, p| roc(&b.close, p), 1),
        entry("stdev", |b, p| stdev(&b.close, p), 0),
        entry("atr", |b, p| atr(&b.high, &b.low, &b.close, p), 0),
        entry("mfi", |b, p| mfi(&b.high, &b.low, &b.close, &b.volume, p), 1),
        entry("force_index", |b, p| force_index(&b.close, &b.volume, p), 1),
        entry("chaikin_money_flow", |b, p| {
            chaikin_money_flow(&b.high, &b.low, &b.close, &b.volume, p)
        }, 0),
        entry("dpo", |b, p| dpo(&b.close, p), 0),
        entry("highest", |b, p| highest(&b.high, p), 0),
        entry("lowest", |b, p| lowest(&b.low, p), 0),
        entry("donchian.middle", |b, p| donchian(&b.high, &b.low, p).middle, 0),
        entry("bollinger.upper", |b, p| bollinger(&b.close, p, 2.0).upper, 0),
        entry("adx.plus_di", |b, p| adx(&b.high, &b.low, &b.close, p).plus_di, 0),
        entry("aroon.up", |b, p| aroon(&b.high, &b.low, p).up, 1),
        entry("vortex.plus", |b, p| vortex(&b.high, &b.low, &b.close, p).plus, 1),
        entry("linear_regression.value", |b, p| linear_regression(&b.close, p).value, 0),
        entry("supertrend", |b, p| supertrend(&b.high, &b.low, &b.close, p, 3.0).supertrend, 0),
    ]
}

fn entry(name: &'static str, indicator: Single, extra: usize) -> (&'static str, Single, usize) {
    (name, indicator, extra)
}

fn leading_undefined(series: &[f64]) -> usize {
    series.iter().take_while(|v| !is_defined(**v)).count()
}

#[test]
fn warmup_prefix_is_undefined_for_every_period() {
    let bars = ohlcv(120);
    for period in [2, 5, 14, 20] {
        for (name, indicator, extra) in period_indicators() {
            let out = indicator(&bars, period);
            assert_eq!(out.len(), bars.close.len(), "{name}: length");
            let prefix = leading_undefined(&out);
            assert!(
                prefix >= period - 1 + extra,
                "{name}({period}): only {prefix} undefined leading values"
            );
            assert!(prefix < out.len(), "{name}({period}): never defined");
        }
    }
}

#[test]
fn short_inputs_are_all_undefined() {
    let bars = ohlcv(4);
    for (name, indicator, _) in period_indicators() {
        let out = indicator(&bars, 10);
        assert_eq!(out.len(), 4, "{name}: length");
        assert!(out.iter().all(|v| !is_defined(*v)), "{name}: {out:?}");
    }

    let empty = ohlcv(0);
    for (name, indicator, _) in period_indicators() {
        assert!(indicator(&empty, 3).is_empty(), "{name}");
    }
}

#[test]
fn identical_inputs_give_bit_identical_outputs() {
    let bars = ohlcv(80);
    for (name, indicator, _) in period_indicators() {
        let a = indicator(&bars, 9);
        let b = indicator(&bars, 9);
        let bits = |s: &[f64]| s.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b), "{name}");
    }
    let first = parabolic_sar(&bars.high, &bars.low, 0.02, 0.2);
    let second = parabolic_sar(&bars.high, &bars.low, 0.02, 0.2);
    assert_eq!(
        first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
    );
}

#[test]
fn sma_scenario() {
    let out = sma(&[100.0, 102.0, 101.0, 103.0, 105.0], 3);
    assert!(!is_defined(out[0]) && !is_defined(out[1]));
    assert_eq!(out[2..], [101.0, 102.0, 103.0]);
}

#[test]
fn donchian_record_through_registry() {
    let high: Vec<f64> = (0..11).map(|i| 10.0 + f64::from(i)).collect();
    let low: Vec<f64> = high.iter().map(|h| h - 2.0).collect();
    let out = BuiltinRegistry::global()
        .call(
            "donchian",
            &[
                ScriptValue::series(&high),
                ScriptValue::series(&low),
                ScriptValue::Int(5),
            ],
        )
        .unwrap();

    let record = out.as_dict().unwrap();
    assert_eq!(
        record.keys().map(String::as_str).collect::<Vec<_>>(),
        ["upper", "middle", "lower"]
    );
    for series in record.values() {
        let values: Vec<f64> = series
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(values.len(), 11);
        assert_eq!(leading_undefined(&values), 4);
    }
    assert_eq!(record["upper"].as_list().unwrap()[4], ScriptValue::Float(14.0));
    assert_eq!(record["lower"].as_list().unwrap()[4], ScriptValue::Float(8.0));
}

#[test]
fn multi_stage_indicators_propagate_undefined() {
    let bars = ohlcv(60);
    let m = macd(&bars.close, 12, 26, 9);
    assert_eq!(leading_undefined(&m.macd), 25);
    assert_eq!(leading_undefined(&m.signal), 33);
    assert_eq!(leading_undefined(&m.histogram), 33);

    let mut gappy = bars.close.clone();
    gappy[0] = f64::NAN;
    let shifted = ema(&gappy, 5);
    assert_eq!(leading_undefined(&shifted), 5);
}

#[test]
fn zero_range_guards_use_neutral_constants() {
    let flat = vec![10.0; 30];
    let wr = williams_r(&flat, &flat, &flat, 14);
    assert!(wr[13..].iter().all(|v| *v == -50.0));
    let c = cci(&flat, &flat, &flat, 20);
    assert!(c[19..].iter().all(|v| *v == 0.0));
    let k = stochastic(&flat, &flat, &flat, 14, 3);
    assert!(k.k[13..].iter().all(|v| *v == 50.0));
}

#[test]
fn balance_of_power_is_bounded_and_flat_bars_read_zero() {
    let bars = ohlcv(50);
    let bop = balance_of_power(&bars.open, &bars.high, &bars.low, &bars.close);
    assert_eq!(bop.len(), 50);
    assert!(bop.iter().all(|v| is_defined(*v) && (-1.0..=1.0).contains(v)));

    let flat = vec![7.0; 3];
    assert_eq!(balance_of_power(&flat, &flat, &flat, &flat), vec![0.0; 3]);
}

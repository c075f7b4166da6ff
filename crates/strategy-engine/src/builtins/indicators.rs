use crate::builtins::args::{record, series};
use crate::builtins::{Args, BuiltinError, BuiltinRegistry};
use crate::indicators::prelude::*;
use crate::indicators::Series;
use crate::runtime::value::ScriptValue;

/// Rejects multi-series inputs whose lengths differ.
fn aligned(args: &Args<'_>, inputs: &[&Series]) -> Result<(), BuiltinError> {
    let first = inputs.first().map_or(0, |s| s.len());
    if inputs.iter().any(|s| s.len() != first) {
        let lengths: Vec<String> = inputs.iter().map(|s| s.len().to_string()).collect();
        return Err(BuiltinError::Value {
            name: args.name(),
            param: "series",
            message: format!("input lengths differ ({})", lengths.join(", ")),
        });
    }
    Ok(())
}

fn hl(args: &Args<'_>) -> Result<(Series, Series), BuiltinError> {
    let high = args.series(0, "high")?;
    let low = args.series(1, "low")?;
    aligned(args, &[&high, &low])?;
    Ok((high, low))
}

fn hlc(args: &Args<'_>) -> Result<(Series, Series, Series), BuiltinError> {
    let high = args.series(0, "high")?;
    let low = args.series(1, "low")?;
    let close = args.series(2, "close")?;
    aligned(args, &[&high, &low, &close])?;
    Ok((high, low, close))
}

fn hlcv(args: &Args<'_>) -> Result<(Series, Series, Series, Series), BuiltinError> {
    let (high, low, close) = hlc(args)?;
    let volume = args.series(3, "volume")?;
    aligned(args, &[&high, &volume])?;
    Ok((high, low, close, volume))
}

fn ohlc(args: &Args<'_>) -> Result<(Series, Series, Series, Series), BuiltinError> {
    let open = args.series(0, "open")?;
    let high = args.series(1, "high")?;
    let low = args.series(2, "low")?;
    let close = args.series(3, "close")?;
    aligned(args, &[&open, &high, &low, &close])?;
    Ok((open, high, low, close))
}

fn cv(args: &Args<'_>) -> Result<(Series, Series), BuiltinError> {
    let close = args.series(0, "close")?;
    let volume = args.series(1, "volume")?;
    aligned(args, &[&close, &volume])?;
    Ok((close, volume))
}

pub(super) fn register(r: &mut BuiltinRegistry) {
    moving_averages(r);
    oscillators(r);
    bands(r);
    trend(r);
    volume(r);
    composite(r);
}

fn moving_averages(r: &mut BuiltinRegistry) {
    r.add("sma", &["src", "period"], 2, |a| {
        Ok(series(sma(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("ema", &["src", "period"], 2, |a| {
        Ok(series(ema(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("wma", &["src", "period"], 2, |a| {
        Ok(series(wma(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("hma", &["src", "period"], 2, |a| {
        Ok(series(hma(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("smma", &["src", "period"], 2, |a| {
        Ok(series(smma(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("tema", &["src", "period"], 2, |a| {
        Ok(series(tema(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("alma", &["src", "period", "offset", "sigma"], 2, |a| {
        Ok(series(alma(
            &a.series(0, "src")?,
            a.period(1, "period")?,
            a.number_or(2, "offset", 0.85)?,
            a.number_or(3, "sigma", 6.0)?,
        )))
    });
    r.add("kama", &["src", "period", "fast", "slow"], 1, |a| {
        Ok(series(kama(
            &a.series(0, "src")?,
            a.period_or(1, "period", 10)?,
            a.period_or(2, "fast", 2)?,
            a.period_or(3, "slow", 30)?,
        )))
    });
}

fn oscillators(r: &mut BuiltinRegistry) {
    r.add("rsi", &["src", "period"], 1, |a| {
        Ok(series(rsi(&a.series(0, "src")?, a.period_or(1, "period", 14)?)))
    });
    r.add(
        "stochastic",
        &["high", "low", "close", "k_period", "d_period"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(stochastic(
                &high,
                &low,
                &close,
                a.period_or(3, "k_period", 14)?,
                a.period_or(4, "d_period", 3)?,
            )))
        },
    );
    r.add(
        "stoch_rsi",
        &["src", "rsi_period", "stoch_period", "k_period", "d_period"],
        1,
        |a| {
            Ok(record(stoch_rsi(
                &a.series(0, "src")?,
                a.period_or(1, "rsi_period", 14)?,
                a.period_or(2, "stoch_period", 14)?,
                a.period_or(3, "k_period", 3)?,
                a.period_or(4, "d_period", 3)?,
            )))
        },
    );
    r.add("cci", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(series(cci(&high, &low, &close, a.period_or(3, "period", 20)?)))
    });
    r.add(
        "cci_smoothed",
        &["high", "low", "close", "period", "smoothing"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(cci_smoothed(
                &high,
                &low,
                &close,
                a.period_or(3, "period", 20)?,
                a.period_or(4, "smoothing", 5)?,
            )))
        },
    );
    r.add("williams_r", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(series(williams_r(&high, &low, &close, a.period_or(3, "period", 14)?)))
    });
    r.add(
        "ultimate_oscillator",
        &["high", "low", "close", "short", "medium", "long"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(series(ultimate_oscillator(
                &high,
                &low,
                &close,
                a.period_or(3, "short", 7)?,
                a.period_or(4, "medium", 14)?,
                a.period_or(5, "long", 28)?,
            )))
        },
    );
    r.add("awesome_oscillator", &["high", "low", "fast", "slow"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(series(awesome_oscillator(
            &high,
            &low,
            a.period_or(2, "fast", 5)?,
            a.period_or(3, "slow", 34)?,
        )))
    });
    r.add(
        "accelerator_oscillator",
        &["high", "low", "fast", "slow", "signal"],
        2,
        |a| {
            let (high, low) = hl(a)?;
            Ok(series(accelerator_oscillator(
                &high,
                &low,
                a.period_or(2, "fast", 5)?,
                a.period_or(3, "slow", 34)?,
                a.period_or(4, "signal", 5)?,
            )))
        },
    );
    r.add("cmo", &["src", "period"], 1, |a| {
        Ok(series(cmo(&a.series(0, "src")?, a.period_or(1, "period", 14)?)))
    });
    r.add("stc", &["src", "fast", "slow", "cycle", "factor"], 1, |a| {
        Ok(series(stc(
            &a.series(0, "src")?,
            a.period_or(1, "fast", 23)?,
            a.period_or(2, "slow", 50)?,
            a.period_or(3, "cycle", 10)?,
            a.number_or(4, "factor", 0.5)?,
        )))
    });
    r.add("tsi", &["src", "long", "short", "signal"], 1, |a| {
        let out = tsi(
            &a.series(0, "src")?,
            a.period_or(1, "long", 25)?,
            a.period_or(2, "short", 13)?,
            a.period_or(3, "signal", 13)?,
        );
        Ok(ScriptValue::dict([
            ("tsi", ScriptValue::series(&out.value)),
            ("signal", ScriptValue::series(&out.signal)),
        ]))
    });
    r.add("kst", &["src", "signal"], 1, |a| {
        let out = kst(&a.series(0, "src")?, a.period_or(1, "signal", 9)?);
        Ok(ScriptValue::dict([
            ("kst", ScriptValue::series(&out.value)),
            ("signal", ScriptValue::series(&out.signal)),
        ]))
    });
    r.add("roc", &["src", "period"], 2, |a| {
        Ok(series(roc(&a.series(0, "src")?, a.period(1, "period")?)))
    });
}

fn bands(r: &mut BuiltinRegistry) {
    r.add("bollinger", &["src", "period", "multiplier"], 1, |a| {
        Ok(record(bollinger(
            &a.series(0, "src")?,
            a.period_or(1, "period", 20)?,
            a.number_or(2, "multiplier", 2.0)?,
        )))
    });
    r.add("bollinger_percent_b", &["src", "period", "multiplier"], 1, |a| {
        Ok(series(bollinger_percent_b(
            &a.series(0, "src")?,
            a.period_or(1, "period", 20)?,
            a.number_or(2, "multiplier", 2.0)?,
        )))
    });
    r.add("bollinger_bandwidth", &["src", "period", "multiplier"], 1, |a| {
        Ok(series(bollinger_bandwidth(
            &a.series(0, "src")?,
            a.period_or(1, "period", 20)?,
            a.number_or(2, "multiplier", 2.0)?,
        )))
    });
    r.add("stdev", &["src", "period"], 2, |a| {
        Ok(series(stdev(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("atr", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(series(atr(&high, &low, &close, a.period_or(3, "period", 14)?)))
    });
    r.add(
        "keltner",
        &["high", "low", "close", "period", "multiplier", "atr_period"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(keltner(
                &high,
                &low,
                &close,
                a.period_or(3, "period", 20)?,
                a.number_or(4, "multiplier", 2.0)?,
                a.period_or(5, "atr_period", 10)?,
            )))
        },
    );
    r.add("donchian", &["high", "low", "period"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(record(donchian(&high, &low, a.period_or(2, "period", 20)?)))
    });
    r.add("price_channel", &["high", "low", "period"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(record(price_channel(&high, &low, a.period_or(2, "period", 20)?)))
    });
    r.add(
        "chandelier_exit",
        &["high", "low", "close", "period", "multiplier"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(chandelier_exit(
                &high,
                &low,
                &close,
                a.period_or(3, "period", 22)?,
                a.number_or(4, "multiplier", 3.0)?,
            )))
        },
    );
    r.add(
        "chande_kroll_stop",
        &["high", "low", "close", "period", "multiplier", "stop_period"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(chande_kroll_stop(
                &high,
                &low,
                &close,
                a.period_or(3, "period", 10)?,
                a.number_or(4, "multiplier", 1.0)?,
                a.period_or(5, "stop_period", 9)?,
            )))
        },
    );
}

fn trend(r: &mut BuiltinRegistry) {
    r.add("macd", &["src", "fast", "slow", "signal"], 1, |a| {
        Ok(record(macd(
            &a.series(0, "src")?,
            a.period_or(1, "fast", 12)?,
            a.period_or(2, "slow", 26)?,
            a.period_or(3, "signal", 9)?,
        )))
    });
    r.add("adx", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(record(adx(&high, &low, &close, a.period_or(3, "period", 14)?)))
    });
    r.add("aroon", &["high", "low", "period"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(record(aroon(&high, &low, a.period_or(2, "period", 25)?)))
    });
    r.add("parabolic_sar", &["high", "low", "step", "max_step"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(series(parabolic_sar(
            &high,
            &low,
            a.number_or(2, "step", 0.02)?,
            a.number_or(3, "max_step", 0.2)?,
        )))
    });
    r.add(
        "supertrend",
        &["high", "low", "close", "period", "multiplier"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(supertrend(
                &high,
                &low,
                &close,
                a.period_or(3, "period", 10)?,
                a.number_or(4, "multiplier", 3.0)?,
            )))
        },
    );
    r.add("vortex", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(record(vortex(&high, &low, &close, a.period_or(3, "period", 14)?)))
    });
    r.add(
        "ichimoku",
        &["high", "low", "close", "tenkan", "kijun", "senkou"],
        3,
        |a| {
            let (high, low, close) = hlc(a)?;
            Ok(record(ichimoku(
                &high,
                &low,
                &close,
                a.period_or(3, "tenkan", 9)?,
                a.period_or(4, "kijun", 26)?,
                a.period_or(5, "senkou", 52)?,
            )))
        },
    );
    r.add("alligator", &["high", "low"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(record(alligator(&high, &low)))
    });
}

fn volume(r: &mut BuiltinRegistry) {
    r.add("obv", &["close", "volume"], 2, |a| {
        let (close, volume) = cv(a)?;
        Ok(series(obv(&close, &volume)))
    });
    r.add("vwap", &["high", "low", "close", "volume"], 4, |a| {
        let (high, low, close, volume) = hlcv(a)?;
        Ok(series(vwap(&high, &low, &close, &volume)))
    });
    r.add("mfi", &["high", "low", "close", "volume", "period"], 4, |a| {
        let (high, low, close, volume) = hlcv(a)?;
        Ok(series(mfi(&high, &low, &close, &volume, a.period_or(4, "period", 14)?)))
    });
    r.add(
        "accumulation_distribution",
        &["high", "low", "close", "volume"],
        4,
        |a| {
            let (high, low, close, volume) = hlcv(a)?;
            Ok(series(accumulation_distribution(&high, &low, &close, &volume)))
        },
    );
    r.add(
        "chaikin_oscillator",
        &["high", "low", "close", "volume", "fast", "slow"],
        4,
        |a| {
            let (high, low, close, volume) = hlcv(a)?;
            Ok(series(chaikin_oscillator(
                &high,
                &low,
                &close,
                &volume,
                a.period_or(4, "fast", 3)?,
                a.period_or(5, "slow", 10)?,
            )))
        },
    );
    r.add(
        "chaikin_money_flow",
        &["high", "low", "close", "volume", "period"],
        4,
        |a| {
            let (high, low, close, volume) = hlcv(a)?;
            Ok(series(chaikin_money_flow(
                &high,
                &low,
                &close,
                &volume,
                a.period_or(4, "period", 20)?,
            )))
        },
    );
    r.add("force_index", &["close", "volume", "period"], 2, |a| {
        let (close, volume) = cv(a)?;
        Ok(series(force_index(&close, &volume, a.period_or(2, "period", 13)?)))
    });
    r.add("elder_force_index", &["close", "volume", "short", "long"], 2, |a| {
        let (close, volume) = cv(a)?;
        Ok(record(elder_force_index(
            &close,
            &volume,
            a.period_or(2, "short", 2)?,
            a.period_or(3, "long", 13)?,
        )))
    });
    r.add("ease_of_movement", &["high", "low", "volume", "period"], 3, |a| {
        let (high, low) = hl(a)?;
        let volume = a.series(2, "volume")?;
        aligned(a, &[&high, &volume])?;
        Ok(series(ease_of_movement(&high, &low, &volume, a.period_or(3, "period", 14)?)))
    });
    r.add(
        "klinger",
        &["high", "low", "close", "volume", "fast", "slow", "signal"],
        4,
        |a| {
            let (high, low, close, volume) = hlcv(a)?;
            Ok(record(klinger(
                &high,
                &low,
                &close,
                &volume,
                a.period_or(4, "fast", 34)?,
                a.period_or(5, "slow", 55)?,
                a.period_or(6, "signal", 13)?,
            )))
        },
    );
    r.add("volume_oscillator", &["volume", "fast", "slow"], 1, |a| {
        Ok(series(volume_oscillator(
            &a.series(0, "volume")?,
            a.period_or(1, "fast", 5)?,
            a.period_or(2, "slow", 10)?,
        )))
    });
    r.add("volume_profile", &["close", "volume", "rows"], 2, |a| {
        let (close, volume) = cv(a)?;
        let profile = volume_profile(&close, &volume, a.period_or(2, "rows", 12)?);
        Ok(ScriptValue::dict([
            ("prices", ScriptValue::series(&profile.prices)),
            ("volumes", ScriptValue::series(&profile.volumes)),
            ("poc", ScriptValue::Float(profile.poc)),
        ]))
    });
}

fn composite(r: &mut BuiltinRegistry) {
    r.add("elder_ray", &["high", "low", "close", "period"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(record(elder_ray(&high, &low, &close, a.period_or(3, "period", 13)?)))
    });
    r.add("dpo", &["close", "period"], 1, |a| {
        Ok(series(dpo(&a.series(0, "close")?, a.period_or(1, "period", 20)?)))
    });
    r.add("mass_index", &["high", "low", "ema_period", "sum_period"], 2, |a| {
        let (high, low) = hl(a)?;
        Ok(series(mass_index(
            &high,
            &low,
            a.period_or(2, "ema_period", 9)?,
            a.period_or(3, "sum_period", 25)?,
        )))
    });
    r.add(
        "coppock",
        &["close", "long_roc", "short_roc", "wma_period"],
        1,
        |a| {
            Ok(series(coppock(
                &a.series(0, "close")?,
                a.period_or(1, "long_roc", 14)?,
                a.period_or(2, "short_roc", 11)?,
                a.period_or(3, "wma_period", 10)?,
            )))
        },
    );
    r.add("balance_of_power", &["open", "high", "low", "close"], 4, |a| {
        let (open, high, low, close) = ohlc(a)?;
        Ok(series(balance_of_power(&open, &high, &low, &close)))
    });
    r.add("heikin_ashi", &["open", "high", "low", "close"], 4, |a| {
        let (open, high, low, close) = ohlc(a)?;
        Ok(record(heikin_ashi(&open, &high, &low, &close)))
    });
    r.add("pivot_points", &["high", "low", "close"], 3, |a| {
        let (high, low, close) = hlc(a)?;
        Ok(record(pivot_points(&high, &low, &close)))
    });
    r.add("fibonacci_retracement", &["high", "low"], 2, |a| {
        let (high, low) = hl(a)?;
        let levels = fibonacci_retracement(&high, &low).levels();
        Ok(ScriptValue::dict(
            levels.into_iter().map(|(k, v)| (k, ScriptValue::Float(v))),
        ))
    });
    r.add("linear_regression", &["src", "period"], 2, |a| {
        Ok(record(linear_regression(&a.series(0, "src")?, a.period(1, "period")?)))
    });
}
